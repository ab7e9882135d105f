//! Application state for the web layer.

use std::sync::Arc;

use crate::auth::{SessionConfig, SessionProvider};
use crate::backend::{Backend, DriverFilter};
use crate::realtime::{ChangeBus, ChangeInterest, RowFilter};
use crate::refresh::{
    ChangeSource, DriverFeed, PendingRequestFeed, RefreshConfig, RefreshController, RefreshHandle,
};

/// Tables whose changes invalidate the driver snapshot.
pub const DRIVER_TABLES: [&str; 3] = ["drivers", "availability", "discounts"];

/// Change interests the server subscribes to.
pub fn change_interests() -> Vec<ChangeInterest> {
    let mut interests: Vec<_> = DRIVER_TABLES.into_iter().map(ChangeInterest::table).collect();
    interests.push(pending_requests_interest());
    interests
}

fn pending_requests_interest() -> ChangeInterest {
    ChangeInterest::table("ride_requests").with_filter(RowFilter::eq("status", "pending"))
}

/// Shared application state.
///
/// Contains all the services needed to handle requests.
pub struct AppState<B: Backend> {
    /// The data store
    pub backend: Arc<B>,

    /// Signed-in sessions
    pub sessions: Arc<SessionProvider<B>>,

    /// Live snapshot of every driver
    pub drivers: Arc<RefreshHandle<DriverFeed<B>>>,

    /// Live snapshot of pending ride requests
    pub requests: Arc<RefreshHandle<PendingRequestFeed<B>>>,

    /// Where checkout returns the browser to
    pub public_url: Arc<str>,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            sessions: Arc::clone(&self.sessions),
            drivers: Arc::clone(&self.drivers),
            requests: Arc::clone(&self.requests),
            public_url: Arc::clone(&self.public_url),
        }
    }
}

impl<B: Backend> AppState<B> {
    /// Create the state and start the refresh controllers.
    ///
    /// Each controller listens on `bus` for changes to its tables.
    pub fn start(
        backend: Arc<B>,
        bus: &ChangeBus,
        refresh: &RefreshConfig,
        sessions: &SessionConfig,
        public_url: &str,
    ) -> Self {
        // A change to any driver table refreshes the whole snapshot.
        let driver_tables = DRIVER_TABLES.into_iter().map(ChangeInterest::table);
        let drivers = RefreshController::spawn(
            DriverFeed::new(Arc::clone(&backend)),
            DriverFilter::all(),
            refresh.clone(),
            Some(ChangeSource::any(bus, driver_tables)),
        );
        let requests = RefreshController::spawn(
            PendingRequestFeed::new(Arc::clone(&backend)),
            (),
            refresh.clone(),
            Some(ChangeSource::new(bus, pending_requests_interest())),
        );

        Self {
            sessions: Arc::new(SessionProvider::new(Arc::clone(&backend), sessions)),
            backend,
            drivers: Arc::new(drivers),
            requests: Arc::new(requests),
            public_url: Arc::from(public_url.trim_end_matches('/')),
        }
    }

    /// Stop both refresh controllers.
    pub fn shutdown(&self) {
        self.drivers.shutdown();
        self.requests.shutdown();
    }
}

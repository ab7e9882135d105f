//! Backend reads the server keeps live.

use std::future::Future;
use std::sync::Arc;

use chrono::Local;

use crate::backend::{Backend, BackendError, DriverFilter};
use crate::domain::{Driver, RideRequest};

use super::controller::Fetch;

/// Every driver with availability and discount.
pub struct DriverFeed<B> {
    backend: Arc<B>,
}

impl<B> DriverFeed<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: Backend> Fetch for DriverFeed<B> {
    type Params = DriverFilter;
    type Output = Vec<Driver>;
    type Error = BackendError;

    fn fetch(&self, filter: &DriverFilter) -> impl Future<Output = Result<Vec<Driver>, BackendError>> + Send {
        self.backend.fetch_drivers(filter)
    }

    fn is_transient(&self, error: &BackendError) -> bool {
        error.is_transient()
    }
}

/// Pending ride requests from today onwards.
pub struct PendingRequestFeed<B> {
    backend: Arc<B>,
}

impl<B> PendingRequestFeed<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: Backend> Fetch for PendingRequestFeed<B> {
    type Params = ();
    type Output = Vec<RideRequest>;
    type Error = BackendError;

    fn fetch(&self, _: &()) -> impl Future<Output = Result<Vec<RideRequest>, BackendError>> + Send {
        self.backend.fetch_pending_requests(Local::now().date_naive())
    }

    fn is_transient(&self, error: &BackendError) -> bool {
        error.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;
    use crate::backend::{MockBackend, RetryPolicy, SignUp};
    use crate::domain::DriverProfile;
    use crate::realtime::{ChangeBus, ChangeInterest};
    use crate::refresh::{ChangeSource, RefreshConfig, RefreshController};

    #[tokio::test]
    async fn driver_feed_refreshes_on_backend_writes() {
        let bus = ChangeBus::new();
        let backend = Arc::new(MockBackend::from_parts(vec![], vec![]).with_bus(bus.clone()));
        let handle = RefreshController::spawn(
            DriverFeed::new(Arc::clone(&backend)),
            DriverFilter::all(),
            RefreshConfig::default(),
            Some(ChangeSource::new(&bus, ChangeInterest::table("drivers"))),
        );
        let mut rx = handle.subscribe();
        let view = rx.wait_for(|v| v.generation >= 1).await.unwrap().clone();
        assert_eq!(view.value.as_deref().map(Vec::len), Some(0));

        let SignUp::SignedIn(session) = backend
            .sign_up("a@example.com", "pw", UserRole::Driver)
            .await
            .unwrap()
        else {
            panic!("mock sign-up signs in immediately");
        };
        let profile = DriverProfile::new(session.user_id.clone(), "Asha", "+1", "Civic");
        backend.upsert_driver(&session, &profile).await.unwrap();

        let view = rx
            .wait_for(|v| v.value.as_deref().is_some_and(|d| d.len() == 1))
            .await
            .unwrap()
            .clone();
        assert_eq!(view.value.unwrap()[0].name, "Asha");
    }

    #[tokio::test]
    async fn pending_feed_surfaces_errors() {
        let backend = Arc::new(MockBackend::from_parts(vec![], vec![]));
        backend.fail_next("fetch_pending_requests");
        let handle = RefreshController::spawn(
            PendingRequestFeed::new(Arc::clone(&backend)),
            (),
            RefreshConfig::default().with_retry(RetryPolicy::none()),
            None,
        );
        let mut rx = handle.subscribe();
        let view = rx.wait_for(|v| v.generation >= 1).await.unwrap().clone();
        assert!(view.value.is_none());
        assert!(view.error.unwrap().contains("injected failure"));
    }
}

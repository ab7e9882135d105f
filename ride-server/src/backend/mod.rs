//! Hosted backend: driver and ride-request read models, writes, auth and
//! checkout.
//!
//! [`BackendClient`] talks to the hosted REST/auth API; [`MockBackend`]
//! serves the same contract from JSON fixtures for local development and
//! tests. Everything above this module is written against [`Backend`].

mod client;
mod convert;
mod error;
mod mock;
pub mod retry;
mod types;

use std::future::Future;

use chrono::NaiveDate;

use crate::auth::{Session, UserRole};
use crate::domain::{
    Availability, Discount, Driver, DriverId, DriverProfile, NewAvailability, NewRideRequest,
    RideRequest,
};

pub use client::{BackendClient, BackendConfig};
pub use convert::ConversionError;
pub use error::BackendError;
pub use mock::MockBackend;
pub use retry::{RetryPolicy, with_retry};
pub use types::{AvailabilityRow, DiscountRow, DriverRow, OneOrMany, RideRequestRow};

/// Which drivers to load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverFilter {
    /// Only drivers with an active subscription
    pub subscribed_only: bool,
    /// Leave out drivers currently on a ride
    pub exclude_on_ride: bool,
    /// Only embed availability on this date (drivers are still returned)
    pub availability_date: Option<NaiveDate>,
}

impl DriverFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn subscribed_only(mut self) -> Self {
        self.subscribed_only = true;
        self
    }

    pub fn exclude_on_ride(mut self) -> Self {
        self.exclude_on_ride = true;
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.availability_date = Some(date);
        self
    }

    /// Apply the filter to already-loaded drivers.
    pub fn apply(&self, drivers: impl IntoIterator<Item = Driver>) -> Vec<Driver> {
        let mut out: Vec<Driver> = drivers
            .into_iter()
            .filter(|d| !self.subscribed_only || d.is_subscribed)
            .filter(|d| !self.exclude_on_ride || !d.is_on_ride)
            .map(|mut d| {
                if let Some(date) = self.availability_date {
                    d.availability.retain(|a| a.date == date);
                }
                d
            })
            .collect();
        out.sort_by(|a, b| b.rides_offered.cmp(&a.rides_offered));
        out
    }
}

/// A hosted checkout page for the driver subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Result of creating an account.
#[derive(Debug, Clone)]
pub enum SignUp {
    /// The account is usable immediately.
    SignedIn(Session),
    /// The user has to follow the emailed confirmation link first.
    ConfirmationRequired { email: String },
}

/// The backend contract.
///
/// Writes take the caller's [`Session`] explicitly; there is no ambient
/// "current user".
pub trait Backend: Send + Sync + 'static {
    /// Drivers with availability and discount, most rides offered first.
    fn fetch_drivers(
        &self,
        filter: &DriverFilter,
    ) -> impl Future<Output = Result<Vec<Driver>, BackendError>> + Send;

    fn fetch_driver(
        &self,
        id: &DriverId,
    ) -> impl Future<Output = Result<Option<Driver>, BackendError>> + Send;

    /// Insert or update the driver row. Returns the stored driver without
    /// embedded availability.
    fn upsert_driver(
        &self,
        session: &Session,
        profile: &DriverProfile,
    ) -> impl Future<Output = Result<Driver, BackendError>> + Send;

    fn delete_driver(
        &self,
        session: &Session,
        id: &DriverId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn insert_availability(
        &self,
        session: &Session,
        entry: &NewAvailability,
    ) -> impl Future<Output = Result<Availability, BackendError>> + Send;

    fn delete_availability(
        &self,
        session: &Session,
        id: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn upsert_discount(
        &self,
        session: &Session,
        driver: &DriverId,
        discount: &Discount,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Pending ride requests dated `from` or later, earliest first.
    fn fetch_pending_requests(
        &self,
        from: NaiveDate,
    ) -> impl Future<Output = Result<Vec<RideRequest>, BackendError>> + Send;

    fn insert_ride_request(
        &self,
        session: &Session,
        request: &NewRideRequest,
    ) -> impl Future<Output = Result<RideRequest, BackendError>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> impl Future<Output = Result<SignUp, BackendError>> + Send;

    fn sign_out(&self, session: &Session) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Start a subscription checkout for the signed-in driver.
    fn create_checkout_session(
        &self,
        session: &Session,
        return_url: &str,
    ) -> impl Future<Output = Result<CheckoutSession, BackendError>> + Send;
}

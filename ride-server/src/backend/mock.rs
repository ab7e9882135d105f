//! In-memory backend for development and tests.
//!
//! Loads drivers and ride requests from JSON files in the same row format
//! the REST API returns, then serves reads and writes from memory. Writes
//! publish change events so live views refresh just as they would against
//! the hosted backend.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::auth::{Session, UserRole};
use crate::domain::{
    Availability, Discount, Driver, DriverId, DriverProfile, NewAvailability, NewRideRequest,
    RideRequest, RideStatus, SlotTime,
};
use crate::realtime::{ChangeBus, ChangeEvent, ChangeKind};

use super::convert::{convert_drivers, convert_ride_requests};
use super::error::BackendError;
use super::types::{DriverRow, RideRequestRow};
use super::{Backend, CheckoutSession, DriverFilter, SignUp};

const DRIVERS_FILE: &str = "drivers.json";
const REQUESTS_FILE: &str = "ride_requests.json";
const USERS_FILE: &str = "users.json";

/// A fixture account.
#[derive(Debug, Clone, Deserialize)]
struct MockUser {
    id: String,
    email: String,
    password: String,
    role: Option<UserRole>,
}

#[derive(Default)]
struct MockState {
    drivers: Vec<Driver>,
    requests: Vec<RideRequest>,
    users: Vec<MockUser>,
    /// access token -> user id
    tokens: HashMap<String, String>,
}

/// Backend that serves data from memory.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<RwLock<MockState>>,
    bus: Option<ChangeBus>,
    /// Operation names that fail on their next call
    failures: Arc<Mutex<HashSet<&'static str>>>,
}

impl MockBackend {
    /// Load fixtures from a directory.
    ///
    /// `drivers.json` is required; `ride_requests.json` and `users.json`
    /// are optional.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, BackendError> {
        let data_dir = data_dir.as_ref();

        let driver_rows: Vec<DriverRow> = read_fixture(&data_dir.join(DRIVERS_FILE))?
            .ok_or_else(|| BackendError::MockData(format!("no {DRIVERS_FILE} in {}", data_dir.display())))?;
        let request_rows: Vec<RideRequestRow> =
            read_fixture(&data_dir.join(REQUESTS_FILE))?.unwrap_or_default();
        let users: Vec<MockUser> = read_fixture(&data_dir.join(USERS_FILE))?.unwrap_or_default();

        let drivers = convert_drivers(&driver_rows);
        let requests = convert_ride_requests(&request_rows);
        tracing::info!(
            drivers = drivers.len(),
            requests = requests.len(),
            users = users.len(),
            dir = %data_dir.display(),
            "loaded mock backend data"
        );

        Ok(Self::from_parts(drivers, requests).with_users(users))
    }

    /// Build directly from domain values.
    pub fn from_parts(drivers: Vec<Driver>, requests: Vec<RideRequest>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                drivers,
                requests,
                ..MockState::default()
            })),
            ..Self::default()
        }
    }

    fn with_users(self, users: Vec<MockUser>) -> Self {
        if let Ok(mut state) = self.state.try_write() {
            state.users = users;
        }
        self
    }

    /// Publish write notifications on `bus`.
    pub fn with_bus(mut self, bus: ChangeBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Register an account.
    pub async fn add_user(&self, email: &str, password: &str, role: Option<UserRole>) -> DriverId {
        let id = uuid::Uuid::new_v4().to_string();
        self.state.write().await.users.push(MockUser {
            id: id.clone(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        });
        DriverId::new(id)
    }

    /// Make the next call to `operation` (a [`Backend`] method name) fail.
    pub fn fail_next(&self, operation: &'static str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation);
    }

    fn injected(&self, operation: &'static str) -> Result<(), BackendError> {
        let hit = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(operation);
        if hit {
            return Err(BackendError::Api {
                status: 500,
                message: format!("injected failure in {operation}"),
            });
        }
        Ok(())
    }

    fn publish(&self, table: &str, kind: ChangeKind, record: serde_json::Value) {
        if let Some(bus) = &self.bus {
            bus.publish(ChangeEvent::new(table, kind).with_record(record));
        }
    }

    /// Snapshot of every driver, unfiltered.
    pub async fn drivers(&self) -> Vec<Driver> {
        self.state.read().await.drivers.clone()
    }
}

fn read_fixture<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, BackendError> {
    if !path.is_file() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| BackendError::MockData(format!("failed to read {}: {e}", path.display())))?;
    let value = serde_json::from_str(&json)
        .map_err(|e| BackendError::MockData(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(value))
}

/// Resolve the session's token, mimicking the hosted API's JWT check.
fn authenticate(state: &MockState, session: &Session) -> Result<DriverId, BackendError> {
    match state.tokens.get(&session.access_token) {
        Some(user_id) if user_id == session.user_id.as_str() => Ok(session.user_id.clone()),
        _ => Err(BackendError::Unauthorized("JWT expired or invalid".to_string())),
    }
}

/// Row-level security: users may only write their own rows.
fn owns(user: &DriverId, row_owner: &DriverId) -> Result<(), BackendError> {
    if user != row_owner {
        return Err(BackendError::Unauthorized(
            "new row violates row-level security policy".to_string(),
        ));
    }
    Ok(())
}

fn issue(state: &mut MockState, user: &MockUser) -> Session {
    let token = format!("mock-{}", uuid::Uuid::new_v4().simple());
    state.tokens.insert(token.clone(), user.id.clone());
    Session {
        user_id: DriverId::new(user.id.clone()),
        email: user.email.clone(),
        role: user.role,
        access_token: token,
        refresh_token: None,
        expires_at: None,
    }
}

fn without_availability(driver: &Driver) -> Driver {
    Driver {
        availability: Vec::new(),
        ..driver.clone()
    }
}

impl Backend for MockBackend {
    async fn fetch_drivers(&self, filter: &DriverFilter) -> Result<Vec<Driver>, BackendError> {
        self.injected("fetch_drivers")?;
        let state = self.state.read().await;
        Ok(filter.apply(state.drivers.iter().cloned()))
    }

    async fn fetch_driver(&self, id: &DriverId) -> Result<Option<Driver>, BackendError> {
        self.injected("fetch_driver")?;
        let state = self.state.read().await;
        Ok(state.drivers.iter().find(|d| &d.id == id).cloned())
    }

    async fn upsert_driver(&self, session: &Session, profile: &DriverProfile) -> Result<Driver, BackendError> {
        self.injected("upsert_driver")?;
        profile.validate()?;
        let mut state = self.state.write().await;
        let user = authenticate(&state, session)?;
        owns(&user, &profile.id)?;

        let position = state.drivers.iter().position(|d| d.id == profile.id);
        let (kind, stored) = match position {
            Some(i) => {
                let existing = &mut state.drivers[i];
                existing.name = profile.name.clone();
                existing.contact = profile.contact.clone();
                existing.car_model = profile.car_model.clone();
                existing.rides_offered = profile.rides_offered;
                existing.is_subscribed = profile.is_subscribed;
                existing.is_on_ride = profile.is_on_ride;
                (ChangeKind::Update, without_availability(existing))
            }
            None => {
                let driver = Driver {
                    id: profile.id.clone(),
                    name: profile.name.clone(),
                    contact: profile.contact.clone(),
                    car_model: profile.car_model.clone(),
                    rides_offered: profile.rides_offered,
                    is_subscribed: profile.is_subscribed,
                    is_on_ride: profile.is_on_ride,
                    availability: Vec::new(),
                    discount: None,
                };
                state.drivers.push(driver.clone());
                (ChangeKind::Insert, driver)
            }
        };
        drop(state);

        self.publish(
            "drivers",
            kind,
            json!({"id": stored.id.as_str(), "is_on_ride": stored.is_on_ride}),
        );
        Ok(stored)
    }

    async fn delete_driver(&self, session: &Session, id: &DriverId) -> Result<(), BackendError> {
        self.injected("delete_driver")?;
        let mut state = self.state.write().await;
        let user = authenticate(&state, session)?;
        owns(&user, id)?;

        let before = state.drivers.len();
        state.drivers.retain(|d| &d.id != id);
        if state.drivers.len() == before {
            return Err(BackendError::NotFound(format!("driver {id}")));
        }
        drop(state);

        self.publish("drivers", ChangeKind::Delete, json!({"id": id.as_str()}));
        Ok(())
    }

    async fn insert_availability(
        &self,
        session: &Session,
        entry: &NewAvailability,
    ) -> Result<Availability, BackendError> {
        self.injected("insert_availability")?;
        let mut state = self.state.write().await;
        let user = authenticate(&state, session)?;
        owns(&user, &entry.driver_id)?;

        let driver = state
            .drivers
            .iter_mut()
            .find(|d| d.id == entry.driver_id)
            .ok_or_else(|| BackendError::Api {
                status: 409,
                message: "insert on availability violates foreign key constraint".to_string(),
            })?;

        let stored = Availability {
            id: uuid::Uuid::new_v4().to_string(),
            driver_id: entry.driver_id.clone(),
            from_area: entry.from_area.clone(),
            to_area: entry.to_area.clone(),
            date: entry.date,
            start_time: SlotTime::from(entry.start_time),
            end_time: SlotTime::from(entry.end_time),
        };
        driver.availability.push(stored.clone());
        drop(state);

        self.publish(
            "availability",
            ChangeKind::Insert,
            json!({"id": stored.id, "driver_id": stored.driver_id.as_str(), "date": stored.date.to_string()}),
        );
        Ok(stored)
    }

    async fn delete_availability(&self, session: &Session, id: &str) -> Result<(), BackendError> {
        self.injected("delete_availability")?;
        let mut state = self.state.write().await;
        let user = authenticate(&state, session)?;

        let driver = state
            .drivers
            .iter_mut()
            .find(|d| d.availability.iter().any(|a| a.id == id))
            .ok_or_else(|| BackendError::NotFound(format!("availability {id}")))?;
        owns(&user, &driver.id)?;
        driver.availability.retain(|a| a.id != id);
        drop(state);

        self.publish("availability", ChangeKind::Delete, json!({"id": id}));
        Ok(())
    }

    async fn upsert_discount(
        &self,
        session: &Session,
        driver: &DriverId,
        discount: &Discount,
    ) -> Result<(), BackendError> {
        self.injected("upsert_discount")?;
        let mut state = self.state.write().await;
        let user = authenticate(&state, session)?;
        owns(&user, driver)?;

        let row = state
            .drivers
            .iter_mut()
            .find(|d| &d.id == driver)
            .ok_or_else(|| BackendError::Api {
                status: 409,
                message: "insert on discounts violates foreign key constraint".to_string(),
            })?;
        let kind = if row.discount.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        row.discount = Some(*discount);
        drop(state);

        self.publish("discounts", kind, json!({"driver_id": driver.as_str()}));
        Ok(())
    }

    async fn fetch_pending_requests(&self, from: NaiveDate) -> Result<Vec<RideRequest>, BackendError> {
        self.injected("fetch_pending_requests")?;
        let state = self.state.read().await;
        let mut pending: Vec<RideRequest> = state
            .requests
            .iter()
            .filter(|r| r.status == RideStatus::Pending && r.date >= from)
            .cloned()
            .collect();
        pending.sort_by(|a, b| (a.date, a.start_time.as_str()).cmp(&(b.date, b.start_time.as_str())));
        Ok(pending)
    }

    async fn insert_ride_request(
        &self,
        session: &Session,
        request: &NewRideRequest,
    ) -> Result<RideRequest, BackendError> {
        self.injected("insert_ride_request")?;
        let mut state = self.state.write().await;
        let user = authenticate(&state, session)?;
        owns(&user, &DriverId::new(request.rider_id.clone()))?;

        let stored = RideRequest {
            id: uuid::Uuid::new_v4().to_string(),
            rider_id: request.rider_id.clone(),
            rider_name: request.rider_name.clone(),
            contact: request.contact.clone(),
            from_area: request.from_area.clone(),
            to_area: request.to_area.clone(),
            date: request.date,
            start_time: SlotTime::from(request.start_time),
            end_time: SlotTime::from(request.end_time),
            status: request.status(),
        };
        state.requests.push(stored.clone());
        drop(state);

        self.publish(
            "ride_requests",
            ChangeKind::Insert,
            json!({"id": stored.id, "status": stored.status.as_str()}),
        );
        Ok(stored)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.injected("sign_in")?;
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email) && u.password == password)
            .cloned()
            .ok_or_else(|| BackendError::Unauthorized("Invalid login credentials".to_string()))?;
        Ok(issue(&mut state, &user))
    }

    async fn sign_up(&self, email: &str, password: &str, role: UserRole) -> Result<SignUp, BackendError> {
        self.injected("sign_up")?;
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(BackendError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        let user = MockUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Some(role),
        };
        state.users.push(user.clone());
        Ok(SignUp::SignedIn(issue(&mut state, &user)))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        self.injected("sign_out")?;
        self.state.write().await.tokens.remove(&session.access_token);
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        session: &Session,
        return_url: &str,
    ) -> Result<CheckoutSession, BackendError> {
        self.injected("create_checkout_session")?;
        authenticate(&*self.state.read().await, session)?;
        let id = format!("cs_mock_{}", uuid::Uuid::new_v4().simple());
        let separator = if return_url.contains('?') { '&' } else { '?' };
        Ok(CheckoutSession {
            url: format!("{return_url}{separator}checkout=mock&session_id={id}"),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DRIVERS: &str = r#"[
        {"id": "d1", "name": "Asha", "contact": "+1555", "car_model": "Civic",
         "rides_offered": 2, "is_subscribed": false, "is_on_ride": false,
         "availability": [{"id": "a1", "driver_id": "d1", "from_area": "Downtown",
            "to_area": "Airport", "date": "2024-03-15", "start_time": "09:00", "end_time": "09:30"}],
         "discounts": {"enabled": true, "percentage": 10}},
        {"id": "d2", "name": "Ben", "rides_offered": 7, "is_on_ride": true}
    ]"#;

    const REQUESTS: &str = r#"[
        {"id": "r2", "rider_id": "u9", "from_area": "A", "to_area": "B", "date": "2024-03-16",
         "start_time": "08:00", "end_time": "09:00", "status": "pending"},
        {"id": "r1", "rider_id": "u9", "from_area": "A", "to_area": "B", "date": "2024-03-15",
         "start_time": "10:00", "end_time": "11:00", "status": "pending"},
        {"id": "r0", "rider_id": "u9", "from_area": "A", "to_area": "B", "date": "2024-03-15",
         "start_time": "07:00", "end_time": "08:00", "status": "accepted"}
    ]"#;

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DRIVERS_FILE), DRIVERS).unwrap();
        fs::write(dir.path().join(REQUESTS_FILE), REQUESTS).unwrap();
        dir
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn loads_fixtures() {
        let dir = fixture_dir();
        let backend = MockBackend::new(dir.path()).unwrap();

        let drivers = backend.fetch_drivers(&DriverFilter::all()).await.unwrap();
        let ids: Vec<&str> = drivers.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);

        let free = backend
            .fetch_drivers(&DriverFilter::all().exclude_on_ride())
            .await
            .unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].discount_percentage(), Some(10));
    }

    #[tokio::test]
    async fn missing_drivers_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(MockBackend::new(dir.path()), Err(BackendError::MockData(_))));
    }

    #[tokio::test]
    async fn malformed_fixture_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DRIVERS_FILE), "{not json").unwrap();
        let err = MockBackend::new(dir.path()).err().unwrap();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[tokio::test]
    async fn pending_requests_sorted_and_filtered() {
        let dir = fixture_dir();
        let backend = MockBackend::new(dir.path()).unwrap();
        let pending = backend.fetch_pending_requests(date(15)).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);

        let later = backend.fetch_pending_requests(date(16)).await.unwrap();
        assert_eq!(later.len(), 1);
    }

    #[tokio::test]
    async fn writes_require_a_valid_session() {
        let backend = MockBackend::from_parts(vec![], vec![]);
        let forged = Session {
            user_id: DriverId::new("u1"),
            email: String::new(),
            role: None,
            access_token: "forged".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        let profile = DriverProfile::new(DriverId::new("u1"), "Asha", "+1", "Civic");
        let err = backend.upsert_driver(&forged, &profile).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn sign_up_then_write_publishes_changes() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();
        let backend = MockBackend::from_parts(vec![], vec![]).with_bus(bus);

        let SignUp::SignedIn(session) = backend
            .sign_up("asha@example.com", "pw", UserRole::Driver)
            .await
            .unwrap()
        else {
            panic!("mock sign-up signs in immediately");
        };

        let profile = DriverProfile::new(session.user_id.clone(), "Asha", "+1", "Civic");
        backend.upsert_driver(&session, &profile).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, "drivers");
        assert_eq!(event.kind, ChangeKind::Insert);

        let entry = NewAvailability::parse(
            session.user_id.clone(),
            "Downtown",
            "Airport",
            date(15),
            "09:00",
            "09:30",
        )
        .unwrap();
        let stored = backend.insert_availability(&session, &entry).await.unwrap();
        assert_eq!(stored.start_time.as_str(), "09:00:00");
        assert_eq!(rx.recv().await.unwrap().table, "availability");

        let driver = backend.fetch_driver(&session.user_id).await.unwrap().unwrap();
        assert_eq!(driver.availability.len(), 1);
    }

    #[tokio::test]
    async fn cannot_write_other_drivers_rows() {
        let backend = MockBackend::from_parts(vec![], vec![]);
        backend.add_user("a@example.com", "pw", Some(UserRole::Driver)).await;
        let session = backend.sign_in("a@example.com", "pw").await.unwrap();

        let profile = DriverProfile::new(DriverId::new("someone-else"), "X", "+1", "Y");
        let err = backend.upsert_driver(&session, &profile).await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn sign_in_and_out() {
        let backend = MockBackend::from_parts(vec![], vec![]);
        backend.add_user("a@example.com", "pw", None).await;

        assert!(backend.sign_in("a@example.com", "wrong").await.unwrap_err().is_auth());
        let session = backend.sign_in("A@example.com", "pw").await.unwrap();
        backend.sign_out(&session).await.unwrap();

        let err = backend
            .create_checkout_session(&session, "http://localhost/")
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn duplicate_sign_up_rejected() {
        let backend = MockBackend::from_parts(vec![], vec![]);
        backend.sign_up("a@example.com", "pw", UserRole::Rider).await.unwrap();
        let err = backend.sign_up("a@example.com", "pw", UserRole::Rider).await.unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let backend = MockBackend::from_parts(vec![], vec![]);
        backend.fail_next("fetch_drivers");
        assert!(backend.fetch_drivers(&DriverFilter::all()).await.is_err());
        assert!(backend.fetch_drivers(&DriverFilter::all()).await.is_ok());
    }

    #[tokio::test]
    async fn checkout_redirects_back() {
        let backend = MockBackend::from_parts(vec![], vec![]);
        let SignUp::SignedIn(session) = backend
            .sign_up("a@example.com", "pw", UserRole::Driver)
            .await
            .unwrap()
        else {
            panic!("mock sign-up signs in immediately");
        };
        let checkout = backend
            .create_checkout_session(&session, "http://localhost:3000/?tab=driver")
            .await
            .unwrap();
        assert!(checkout.url.starts_with("http://localhost:3000/?tab=driver&checkout=mock"));
        assert!(checkout.url.ends_with(&checkout.id));
    }

    #[tokio::test]
    async fn shipped_sample_data_loads() {
        let backend = MockBackend::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data")).unwrap();
        let drivers = backend.fetch_drivers(&DriverFilter::all()).await.unwrap();
        assert_eq!(drivers.len(), 3);
        assert_eq!(drivers[0].name, "Chloe Wanjiru");
        assert_eq!(drivers[1].discount_percentage(), Some(10));

        let session = backend.sign_in("dan@example.com", "password").await.unwrap();
        assert_eq!(session.role, Some(UserRole::Rider));
    }
}

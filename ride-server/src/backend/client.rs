//! HTTP client for the hosted backend.
//!
//! Table reads and writes go through the REST endpoint (`/rest/v1`), sign
//! in/up/out through the auth endpoint (`/auth/v1`), and the subscription
//! checkout through a serverless function. Every request carries the
//! project's anon key; writes authenticate as the signed-in user.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::auth::{Session, UserRole};
use crate::domain::{
    Availability, ClockTime, Discount, Driver, DriverId, DriverProfile, NewAvailability,
    NewRideRequest, RideRequest, SlotTime,
};

use super::convert::{
    convert_availability, convert_driver, convert_drivers, convert_ride_request,
    convert_ride_requests, convert_session,
};
use super::error::BackendError;
use super::retry::{RetryPolicy, with_retry};
use super::types::{
    AuthResponse, AvailabilityRow, AvailabilityWrite, CheckoutResponse, Credentials, DiscountWrite,
    DriverRow, DriverWrite, ErrorBody, RideRequestRow, RideRequestWrite,
};
use super::{Backend, CheckoutSession, DriverFilter, SignUp};

/// Columns loaded for every driver query.
const DRIVER_SELECT: &str = "id,name,contact,car_model,rides_offered,is_subscribed,is_on_ride,\
availability(id,driver_id,from_area,to_area,date,start_time,end_time),discounts(enabled,percentage)";

/// Default path of the checkout function, relative to the base URL.
const DEFAULT_CHECKOUT_PATH: &str = "functions/v1/create-checkout-session";

/// Hosted checkout page used when the function returns only a session id.
const CHECKOUT_PAGE_BASE: &str = "https://checkout.stripe.com/pay/";

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`
    pub base_url: String,
    /// Public (anon) API key
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Checkout function path, relative to `base_url`
    pub checkout_path: String,
    /// Retry applied to reads
    pub retry: RetryPolicy,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: 30,
            checkout_path: DEFAULT_CHECKOUT_PATH.to_string(),
            retry: RetryPolicy::none(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_checkout_path(mut self, path: impl Into<String>) -> Self {
        self.checkout_path = path.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Backend API client.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    checkout_path: String,
    retry: RetryPolicy,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key).map_err(|_| BackendError::Api {
            status: 0,
            message: "Invalid API key format".to_string(),
        })?;
        headers.insert("apikey", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            checkout_path: config.checkout_path.trim_start_matches('/').to_string(),
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn rest(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Anonymous read.
    fn anon(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    /// Write as the signed-in user.
    fn as_user(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        builder.bearer_auth(&session.access_token)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        with_retry(self.retry, BackendError::is_transient, move || async move {
            let response = self.anon(self.http.get(self.rest(table)).query(query)).send().await?;
            read_json(check(response).await?).await
        })
        .await
    }

    async fn load_drivers(&self, query: Vec<(&str, String)>) -> Result<Vec<Driver>, BackendError> {
        let rows: Vec<DriverRow> = self.get_rows("drivers", &query).await?;
        tracing::debug!(rows = rows.len(), "loaded driver rows");
        Ok(convert_drivers(&rows))
    }
}

/// Map error statuses to [`BackendError`].
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message().map(str::to_string))
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited,
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| BackendError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(500).collect()),
    })
}

fn first_row<T>(rows: Vec<T>, table: &str) -> Result<T, BackendError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(format!("{table}: write returned no row")))
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn time_param(time: ClockTime) -> String {
    SlotTime::from(time).as_str().to_string()
}

impl Backend for BackendClient {
    async fn fetch_drivers(&self, filter: &DriverFilter) -> Result<Vec<Driver>, BackendError> {
        let mut query = vec![
            ("select", DRIVER_SELECT.to_string()),
            ("order", "rides_offered.desc".to_string()),
        ];
        if filter.subscribed_only {
            query.push(("is_subscribed", "eq.true".to_string()));
        }
        if filter.exclude_on_ride {
            query.push(("is_on_ride", "eq.false".to_string()));
        }
        if let Some(date) = filter.availability_date {
            query.push(("availability.date", format!("eq.{}", date_param(date))));
        }
        self.load_drivers(query).await
    }

    async fn fetch_driver(&self, id: &DriverId) -> Result<Option<Driver>, BackendError> {
        let query = vec![
            ("select", DRIVER_SELECT.to_string()),
            ("id", format!("eq.{id}")),
        ];
        Ok(self.load_drivers(query).await?.into_iter().next())
    }

    async fn upsert_driver(&self, session: &Session, profile: &DriverProfile) -> Result<Driver, BackendError> {
        profile.validate()?;
        let body = DriverWrite {
            id: profile.id.as_str(),
            name: &profile.name,
            contact: &profile.contact,
            car_model: &profile.car_model,
            rides_offered: profile.rides_offered,
            is_subscribed: profile.is_subscribed,
            is_on_ride: profile.is_on_ride,
        };

        let request = self
            .http
            .post(self.rest("drivers"))
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(&body);
        let response = self.as_user(request, session).send().await?;
        let rows: Vec<DriverRow> = read_json(check(response).await?).await?;
        Ok(convert_driver(&first_row(rows, "drivers")?)?)
    }

    async fn delete_driver(&self, session: &Session, id: &DriverId) -> Result<(), BackendError> {
        let request = self.http.delete(self.rest("drivers")).query(&[("id", format!("eq.{id}"))]);
        check(self.as_user(request, session).send().await?).await?;
        Ok(())
    }

    async fn insert_availability(
        &self,
        session: &Session,
        entry: &NewAvailability,
    ) -> Result<Availability, BackendError> {
        let body = AvailabilityWrite {
            driver_id: entry.driver_id.as_str(),
            from_area: &entry.from_area,
            to_area: &entry.to_area,
            date: date_param(entry.date),
            start_time: time_param(entry.start_time),
            end_time: time_param(entry.end_time),
        };

        let request = self
            .http
            .post(self.rest("availability"))
            .header("Prefer", "return=representation")
            .json(&body);
        let response = self.as_user(request, session).send().await?;
        let rows: Vec<AvailabilityRow> = read_json(check(response).await?).await?;
        Ok(convert_availability(&first_row(rows, "availability")?)?)
    }

    async fn delete_availability(&self, session: &Session, id: &str) -> Result<(), BackendError> {
        let request = self
            .http
            .delete(self.rest("availability"))
            .query(&[("id", format!("eq.{id}"))]);
        check(self.as_user(request, session).send().await?).await?;
        Ok(())
    }

    async fn upsert_discount(
        &self,
        session: &Session,
        driver: &DriverId,
        discount: &Discount,
    ) -> Result<(), BackendError> {
        let body = DiscountWrite {
            driver_id: driver.as_str(),
            enabled: discount.enabled(),
            percentage: discount.percentage(),
        };

        let request = self
            .http
            .post(self.rest("discounts"))
            .query(&[("on_conflict", "driver_id")])
            .header("Prefer", "return=minimal,resolution=merge-duplicates")
            .json(&body);
        check(self.as_user(request, session).send().await?).await?;
        Ok(())
    }

    async fn fetch_pending_requests(&self, from: NaiveDate) -> Result<Vec<RideRequest>, BackendError> {
        let query = [
            ("select", "*".to_string()),
            ("status", "eq.pending".to_string()),
            ("date", format!("gte.{}", date_param(from))),
            ("order", "date.asc,start_time.asc".to_string()),
        ];
        let rows: Vec<RideRequestRow> = self.get_rows("ride_requests", &query).await?;
        Ok(convert_ride_requests(&rows))
    }

    async fn insert_ride_request(
        &self,
        session: &Session,
        request: &NewRideRequest,
    ) -> Result<RideRequest, BackendError> {
        let body = RideRequestWrite {
            rider_id: &request.rider_id,
            rider_name: &request.rider_name,
            contact: &request.contact,
            from_area: &request.from_area,
            to_area: &request.to_area,
            date: date_param(request.date),
            start_time: time_param(request.start_time),
            end_time: time_param(request.end_time),
            status: request.status().as_str(),
        };

        let builder = self
            .http
            .post(self.rest("ride_requests"))
            .header("Prefer", "return=representation")
            .json(&body);
        let response = self.as_user(builder, session).send().await?;
        let rows: Vec<RideRequestRow> = read_json(check(response).await?).await?;
        Ok(convert_ride_request(&first_row(rows, "ride_requests")?)?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let body = Credentials {
            email,
            password,
            data: None,
        };
        let request = self
            .http
            .post(self.auth("token"))
            .query(&[("grant_type", "password")])
            .json(&body);
        let response = self.anon(request).send().await?;

        // Bad credentials come back as 400 invalid_grant.
        let response = match check(response).await {
            Err(BackendError::Api { status: 400, message }) => {
                return Err(BackendError::Unauthorized(message));
            }
            other => other?,
        };
        let resp: AuthResponse = read_json(response).await?;
        let session = convert_session(&resp, Utc::now())?;
        tracing::info!(user = %session.user_id, "signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, role: UserRole) -> Result<SignUp, BackendError> {
        let body = Credentials {
            email,
            password,
            data: Some(json!({ "role": role.as_str() })),
        };
        let response = self.anon(self.http.post(self.auth("signup")).json(&body)).send().await?;
        let resp: AuthResponse = read_json(check(response).await?).await?;

        if resp.access_token.is_none() {
            tracing::info!(%role, "sign-up awaiting email confirmation");
            return Ok(SignUp::ConfirmationRequired {
                email: resp.email.unwrap_or_else(|| email.to_string()),
            });
        }
        let session = convert_session(&resp, Utc::now())?;
        tracing::info!(user = %session.user_id, %role, "signed up");
        Ok(SignUp::SignedIn(session))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        let request = self.http.post(self.auth("logout"));
        check(self.as_user(request, session).send().await?).await?;
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        session: &Session,
        return_url: &str,
    ) -> Result<CheckoutSession, BackendError> {
        let url = format!("{}/{}", self.base_url, self.checkout_path);
        let body = json!({
            "driver_id": session.user_id.as_str(),
            "email": session.email,
            "return_url": return_url,
        });
        let response = self.as_user(self.http.post(url).json(&body), session).send().await?;
        let resp: CheckoutResponse = read_json(check(response).await?).await?;

        let url = resp
            .url
            .unwrap_or_else(|| format!("{CHECKOUT_PAGE_BASE}{}", resp.session_id));
        Ok(CheckoutSession {
            id: resp.session_id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn session() -> Session {
        Session {
            user_id: DriverId::new("u1"),
            email: "asha@example.com".to_string(),
            role: Some(UserRole::Driver),
            access_token: "user-token".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    async fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(BackendConfig::new(server.uri(), "anon-key")).unwrap()
    }

    fn driver_json() -> serde_json::Value {
        json!([{
            "id": "d1", "name": "Asha", "contact": "+1555", "car_model": "Civic",
            "rides_offered": 3, "is_subscribed": false, "is_on_ride": false,
            "availability": [{"id": "a1", "driver_id": "d1", "from_area": "Downtown",
                "to_area": "Airport", "date": "2024-03-15",
                "start_time": "09:00:00", "end_time": "09:30:00"}],
            "discounts": null
        }])
    }

    #[tokio::test]
    async fn fetch_drivers_sends_keys_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/drivers"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .and(query_param("order", "rides_offered.desc"))
            .and(query_param("is_on_ride", "eq.false"))
            .and(query_param("availability.date", "eq.2024-03-15"))
            .and(query_param("select", DRIVER_SELECT))
            .respond_with(ResponseTemplate::new(200).set_body_json(driver_json()))
            .expect(1)
            .mount(&server)
            .await;

        let filter = DriverFilter::all()
            .exclude_on_ride()
            .on_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        let drivers = client(&server).await.fetch_drivers(&filter).await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].name, "Asha");
        assert_eq!(drivers[0].availability[0].start_time.display(), "9:00 AM");
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ride_requests"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "JWT expired"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .fetch_pending_requests(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
            .await
            .unwrap_err();
        match err {
            BackendError::Unauthorized(msg) => assert_eq!(msg, "JWT expired"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_read_retried_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/drivers"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/drivers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(driver_json()))
            .mount(&server)
            .await;

        let config = BackendConfig::new(server.uri(), "anon-key")
            .with_retry(RetryPolicy::once(Duration::from_millis(10)));
        let client = BackendClient::new(config).unwrap();
        let drivers = client.fetch_drivers(&DriverFilter::all()).await.unwrap();
        assert_eq!(drivers.len(), 1);
    }

    #[tokio::test]
    async fn upsert_driver_writes_as_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/drivers"))
            .and(header("authorization", "Bearer user-token"))
            .and(|req: &Request| {
                req.headers.get("prefer").and_then(|v| v.to_str().ok())
                    == Some("return=representation,resolution=merge-duplicates")
            })
            .and(body_json(json!({
                "id": "u1", "name": "Asha", "contact": "+1555", "car_model": "Civic",
                "rides_offered": 0, "is_subscribed": false, "is_on_ride": false
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": "u1", "name": "Asha", "contact": "+1555", "car_model": "Civic",
                "rides_offered": 0, "is_subscribed": false, "is_on_ride": false
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let profile = DriverProfile::new(DriverId::new("u1"), "Asha", "+1555", "Civic");
        let driver = client(&server).await.upsert_driver(&session(), &profile).await.unwrap();
        assert_eq!(driver.id.as_str(), "u1");
        assert!(driver.availability.is_empty());
    }

    #[tokio::test]
    async fn upsert_driver_validates_before_sending() {
        let server = MockServer::start().await;
        let profile = DriverProfile::new(DriverId::new("u1"), " ", "+1555", "Civic");
        let err = client(&server).await.upsert_driver(&session(), &profile).await.unwrap_err();
        assert!(matches!(err, BackendError::Domain(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_availability_formats_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/availability"))
            .and(body_json(json!({
                "driver_id": "u1", "from_area": "Downtown", "to_area": "Airport",
                "date": "2024-03-15", "start_time": "09:00:00", "end_time": "09:30:00"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": "a9", "driver_id": "u1", "from_area": "Downtown", "to_area": "Airport",
                "date": "2024-03-15", "start_time": "09:00:00", "end_time": "09:30:00"
            }])))
            .mount(&server)
            .await;

        let entry = NewAvailability::parse(
            DriverId::new("u1"),
            "Downtown",
            "Airport",
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "09:00",
            "09:30",
        )
        .unwrap();
        let stored = client(&server).await.insert_availability(&session(), &entry).await.unwrap();
        assert_eq!(stored.id, "a9");
    }

    #[tokio::test]
    async fn sign_in_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.sign_in("a@b.c", "nope").await.unwrap_err();
        match err {
            BackendError::Unauthorized(msg) => assert_eq!(msg, "Invalid login credentials"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_in_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(body_json(json!({"email": "asha@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt", "refresh_token": "r", "expires_in": 3600,
                "user": {"id": "u1", "email": "asha@example.com", "user_metadata": {"role": "driver"}}
            })))
            .mount(&server)
            .await;

        let session = client(&server).await.sign_in("asha@example.com", "pw").await.unwrap();
        assert_eq!(session.user_id.as_str(), "u1");
        assert_eq!(session.role, Some(UserRole::Driver));
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn sign_up_with_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(body_json(json!({
                "email": "new@example.com", "password": "pw", "data": {"role": "rider"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u2", "email": "new@example.com"
            })))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .await
            .sign_up("new@example.com", "pw", UserRole::Rider)
            .await
            .unwrap();
        assert!(matches!(outcome, SignUp::ConfirmationRequired { email } if email == "new@example.com"));
    }

    #[tokio::test]
    async fn checkout_falls_back_to_hosted_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/create-checkout-session"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "cs_1"})))
            .mount(&server)
            .await;

        let checkout = client(&server)
            .await
            .create_checkout_session(&session(), "http://localhost/")
            .await
            .unwrap();
        assert_eq!(checkout.id, "cs_1");
        assert_eq!(checkout.url, "https://checkout.stripe.com/pay/cs_1");
    }

    #[tokio::test]
    async fn checkout_path_is_configurable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/subscribe"))
            .and(body_json(json!({
                "driver_id": "u1",
                "email": "asha@example.com",
                "return_url": "http://localhost/",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sessionId": "cs_2", "url": "https://pay.example/cs_2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig::new(server.uri(), "anon-key").with_checkout_path("/functions/v1/subscribe");
        let checkout = BackendClient::new(config)
            .unwrap()
            .create_checkout_session(&session(), "http://localhost/")
            .await
            .unwrap();
        assert_eq!(checkout.url, "https://pay.example/cs_2");
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/drivers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = BackendConfig::new(server.uri(), "anon-key").with_timeout(1);
        let err = BackendClient::new(config)
            .unwrap()
            .fetch_drivers(&DriverFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(&err, BackendError::Http(e) if e.is_timeout()), "{err:?}");
        assert!(err.is_transient());
    }
}

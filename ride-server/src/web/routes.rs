//! HTTP route handlers.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Local;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{Registration, Session, UserRole};
use crate::backend::{Backend, BackendError};
use crate::domain::{Availability, DomainError, Driver, NewRideRequest, Now, SearchParams};
use crate::matcher::{MatchQuery, match_driver_refs, matching_entries, open_ride_requests};
use crate::offers::{OfferError, publish_offer};
use crate::refresh::{Fetch, RefreshHandle, View};
use crate::slots::{TimeSlotGroup, group_by_window};

use super::dto::*;
use super::state::AppState;
use super::templates::*;

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "ride_session";

/// How long a request waits for a snapshot that has never loaded.
const FIRST_LOAD_WAIT: Duration = Duration::from_secs(5);

/// Create the application router.
///
/// `static_dir` is the path to the static assets directory.
pub fn create_router<B: Backend>(state: AppState<B>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(index_page::<B>))
        .route("/health", get(health))
        .route("/drivers/available", get(available_drivers::<B>))
        .route("/rides/search", get(search_rides::<B>))
        .route(
            "/ride-requests",
            get(list_ride_requests::<B>).post(create_ride_request::<B>),
        )
        .route("/offers", post(create_offer::<B>))
        .route("/auth/sign-in", post(sign_in::<B>))
        .route("/auth/sign-up", post(sign_up::<B>))
        .route("/auth/sign-out", post(sign_out::<B>))
        .route("/checkout", post(checkout::<B>))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Home page: who is available now, plus open requests for drivers.
async fn index_page<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = current_session(&state, &headers).await;
    let now = Now::local();

    let view = loaded(&state.drivers).await;
    let drivers = snapshot(&view)?;
    let query = MatchQuery::new().available_now(now);
    let drivers = card_views(&drivers, &query);

    let requests = match &session {
        Some(s) if s.is_driver() => {
            let view = loaded(&state.requests).await;
            let open = open_ride_requests(&snapshot(&view)?, now);
            Some(open.iter().map(RideRequestView::from_request).collect())
        }
        _ => None,
    };

    render(IndexTemplate {
        user: session.as_deref().map(UserView::from_session),
        drivers,
        requests,
        stale_reason: view.error.clone(),
        today: now.date.format("%Y-%m-%d").to_string(),
    })
}

/// Drivers with an entry today that has not yet ended.
async fn available_drivers<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let view = loaded(&state.drivers).await;
    let drivers = snapshot(&view)?;
    let query = MatchQuery::new().available_now(Now::local());

    if accepts_html(&headers) {
        render(DriverListTemplate {
            drivers: card_views(&drivers, &query),
            empty_message: "No drivers are available right now.",
        })
    } else {
        Ok(Json(driver_list(&drivers, &query, &view)).into_response())
    }
}

/// Drivers offering a ride on a date, optionally between two areas.
async fn search_rides<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Query(req): Query<RideSearchRequest>,
) -> Result<Response, AppError> {
    let params = SearchParams::new(req.date)
        .with_from_area(req.from.trim())
        .with_to_area(req.to.trim());
    let query = MatchQuery::from(&params);

    let view = loaded(&state.drivers).await;
    let drivers = snapshot(&view)?;
    tracing::debug!(date = %params.date, from = %params.from_area, to = %params.to_area, "ride search");

    if accepts_html(&headers) {
        let session = current_session(&state, &headers).await;
        render(SearchTemplate {
            user: session.as_deref().map(UserView::from_session),
            date: params.date.format("%Y-%m-%d").to_string(),
            from: params.from_area,
            to: params.to_area,
            drivers: card_views(&drivers, &query),
            stale_reason: view.error.clone(),
        })
    } else {
        Ok(Json(driver_list(&drivers, &query, &view)).into_response())
    }
}

/// Pending ride requests that have not yet expired. Drivers only.
async fn list_ride_requests<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = require_session(&state, &headers).await?;
    require_driver(&session, "view ride requests")?;

    let view = loaded(&state.requests).await;
    let requests = open_ride_requests(&snapshot(&view)?, Now::local());

    if accepts_html(&headers) {
        render(RideRequestListTemplate {
            requests: requests.iter().map(RideRequestView::from_request).collect(),
        })
    } else {
        Ok(Json(RideRequestListResponse {
            requests: requests.iter().map(RideRequestResult::from_request).collect(),
            stale_reason: view.error.clone(),
        })
        .into_response())
    }
}

/// Post a ride request on behalf of the signed-in user.
async fn create_ride_request<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Form(form): Form<RideRequestForm>,
) -> Result<Response, AppError> {
    let session = require_session(&state, &headers).await?;
    let request = NewRideRequest::parse(
        session.user_id.as_str(),
        &form.rider_name,
        &form.contact,
        &form.from_area,
        &form.to_area,
        form.date,
        &form.start_time,
        &form.end_time,
    )?;

    let created = state.backend.insert_ride_request(&session, &request).await?;
    tracing::info!(request = %created.id, rider = %session.user_id, "ride request posted");
    state.requests.refresh();

    if accepts_html(&headers) {
        Ok(Redirect::to("/").into_response())
    } else {
        let body = Json(RideRequestResult::from_request(&created));
        Ok((StatusCode::CREATED, body).into_response())
    }
}

/// Publish a driver's offer: profile, availability entry and discount.
async fn create_offer<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Form(req): Form<OfferRequest>,
) -> Result<Response, AppError> {
    let session = require_session(&state, &headers).await?;
    require_driver(&session, "publish offers")?;

    let published = publish_offer(state.backend.as_ref(), &session, &req.into()).await?;
    state.drivers.refresh();

    if accepts_html(&headers) {
        Ok(Redirect::to("/").into_response())
    } else {
        let body = Json(OfferResponse::from_published(&published));
        Ok((StatusCode::CREATED, body).into_response())
    }
}

async fn sign_in<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Form(req): Form<SignInRequest>,
) -> Result<Response, AppError> {
    let (token, session) = state.sessions.sign_in(&req.email, &req.password).await?;
    tracing::info!(user = %session.user_id, "signed in");
    Ok(signed_in(&headers, &token, &session))
}

async fn sign_up<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    Form(req): Form<SignUpRequest>,
) -> Result<Response, AppError> {
    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(role) => role.parse::<UserRole>().map_err(|e| AppError::BadRequest {
            message: e.to_string(),
        })?,
        None => UserRole::Rider,
    };

    match state.sessions.sign_up(&req.email, &req.password, role).await? {
        Registration::SignedIn { token, session } => {
            tracing::info!(user = %session.user_id, %role, "signed up");
            Ok(signed_in(&headers, &token, &session))
        }
        Registration::ConfirmationRequired { email } => {
            tracing::info!(%email, "sign-up awaiting confirmation");
            if accepts_html(&headers) {
                render(MessageTemplate {
                    user: None,
                    title: "Check your inbox".to_string(),
                    message: format!("We sent a confirmation link to {email}."),
                })
            } else {
                Ok(Json(SignUpResponse::ConfirmationRequired { email }).into_response())
            }
        }
    }
}

/// End the session. The cookie is cleared even if the backend refuses.
async fn sign_out<B: Backend>(State(state): State<AppState<B>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers)
        && let Err(e) = state.sessions.sign_out(token).await
    {
        tracing::debug!(error = %e, "sign-out incomplete");
    }

    let clear = [(header::SET_COOKIE, session_cookie(""))];
    if accepts_html(&headers) {
        (clear, Redirect::to("/")).into_response()
    } else {
        (clear, StatusCode::NO_CONTENT).into_response()
    }
}

/// Hand the browser to the payment provider's checkout page.
async fn checkout<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = require_session(&state, &headers).await?;
    require_driver(&session, "subscribe")?;

    let return_url = format!("{}/?checkout=success", state.public_url);
    let checkout = state
        .backend
        .create_checkout_session(&session, &return_url)
        .await?;
    tracing::info!(user = %session.user_id, checkout = %checkout.id, "checkout started");
    Ok(Redirect::to(&checkout.url).into_response())
}

// ============================================================================
// Helpers
// ============================================================================

/// Check if request accepts HTML.
fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn render(template: impl Template) -> Result<Response, AppError> {
    let html = template.render().map_err(|e| AppError::Internal {
        message: format!("Template error: {e}"),
    })?;
    Ok(Html(html).into_response())
}

/// The session token from the request's cookies.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

fn session_cookie(token: &str) -> String {
    if token.is_empty() {
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    } else {
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
    }
}

fn signed_in(headers: &HeaderMap, token: &str, session: &Session) -> Response {
    let cookie = [(header::SET_COOKIE, session_cookie(token))];
    if accepts_html(headers) {
        (cookie, Redirect::to("/")).into_response()
    } else {
        (cookie, Json(SessionResult::from_session(session))).into_response()
    }
}

async fn current_session<B: Backend>(state: &AppState<B>, headers: &HeaderMap) -> Option<Arc<Session>> {
    match session_token(headers) {
        Some(token) => state.sessions.get(token).await,
        None => None,
    }
}

async fn require_session<B: Backend>(
    state: &AppState<B>,
    headers: &HeaderMap,
) -> Result<Arc<Session>, AppError> {
    Ok(state.sessions.require(session_token(headers)).await?)
}

fn require_driver(session: &Session, action: &str) -> Result<(), AppError> {
    if session.is_driver() {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: format!("only drivers can {action}"),
        })
    }
}

/// The current view, waiting briefly if nothing has been fetched yet.
async fn loaded<F: Fetch>(handle: &RefreshHandle<F>) -> View<F::Output> {
    let mut rx = handle.subscribe();
    let first = async {
        loop {
            let generation = rx.borrow_and_update().generation;
            if generation > 0 || rx.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(FIRST_LOAD_WAIT, first).await.is_err() {
        tracing::warn!("snapshot not loaded yet");
    }
    handle.current()
}

/// The last good value. A failed refresh with nothing to fall back on is
/// an upstream error; a view that has not loaded yet is unavailable.
fn snapshot<T>(view: &View<Vec<T>>) -> Result<Arc<Vec<T>>, AppError> {
    match (&view.value, &view.error) {
        (Some(value), _) => Ok(Arc::clone(value)),
        (None, Some(error)) => Err(AppError::Upstream {
            message: error.clone(),
        }),
        (None, None) => Err(AppError::Unavailable {
            message: "results are still loading, try again shortly".to_string(),
        }),
    }
}

/// Matched drivers, each with the entries that matched grouped into slots.
fn matches_with_slots<'a>(drivers: &'a [Driver], query: &MatchQuery) -> Vec<(&'a Driver, Vec<TimeSlotGroup>)> {
    match_driver_refs(drivers, query)
        .into_iter()
        .map(|driver| {
            let entries: Vec<Availability> = matching_entries(driver, query).into_iter().cloned().collect();
            (driver, group_by_window(&entries))
        })
        .collect()
}

fn card_views(drivers: &[Driver], query: &MatchQuery) -> Vec<DriverCardView> {
    matches_with_slots(drivers, query)
        .iter()
        .map(|(driver, slots)| DriverCardView::from_driver(driver, slots))
        .collect()
}

fn driver_list(drivers: &[Driver], query: &MatchQuery, view: &View<Vec<Driver>>) -> DriverListResponse {
    DriverListResponse {
        drivers: matches_with_slots(drivers, query)
            .iter()
            .map(|(driver, slots)| DriverResult::from_driver(driver, slots))
            .collect(),
        refreshed_at: view
            .refreshed_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()),
        stale_reason: view.error.clone(),
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Unauthorized { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    Upstream { message: String },
    Unavailable { message: String },
    Internal { message: String },
}

impl AppError {
    /// Classify a backend failure, reporting it with `message`.
    fn from_backend(e: &BackendError, message: String) -> Self {
        match e {
            BackendError::AuthRequired | BackendError::Unauthorized(_) => {
                AppError::Unauthorized { message }
            }
            BackendError::NotFound(_) => AppError::NotFound { message },
            BackendError::Domain(_) => AppError::BadRequest { message },
            BackendError::Api { status, .. } if (400..500).contains(status) => {
                AppError::BadRequest { message }
            }
            BackendError::MockData(_) => AppError::Internal { message },
            _ => AppError::Upstream { message },
        }
    }
}

impl From<BackendError> for AppError {
    fn from(e: BackendError) -> Self {
        AppError::from_backend(&e, e.to_string())
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<OfferError> for AppError {
    fn from(e: OfferError) -> Self {
        match e.backend_error() {
            Some(source) => AppError::from_backend(source, e.to_string()),
            None => AppError::BadRequest {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message),
            AppError::Forbidden { message } => (StatusCode::FORBIDDEN, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        } else {
            tracing::debug!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

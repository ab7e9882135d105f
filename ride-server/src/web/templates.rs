//! Askama templates for the web frontend.

use askama::Template;

use crate::auth::Session;
use crate::domain::{Driver, RideRequest, SlotTime};
use crate::slots::TimeSlotGroup;

// ============================================================================
// Page Templates (extend base.html)
// ============================================================================

/// Home page: drivers available now, and open requests for drivers.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub user: Option<UserView>,
    pub drivers: Vec<DriverCardView>,
    /// `None` unless a driver is signed in
    pub requests: Option<Vec<RideRequestView>>,
    pub stale_reason: Option<String>,
    pub today: String,
}

/// Dated ride search page.
#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub user: Option<UserView>,
    pub date: String,
    pub from: String,
    pub to: String,
    pub drivers: Vec<DriverCardView>,
    pub stale_reason: Option<String>,
}

/// A short notice, e.g. "check your inbox".
#[derive(Template)]
#[template(path = "message.html")]
pub struct MessageTemplate {
    pub user: Option<UserView>,
    pub title: String,
    pub message: String,
}

// ============================================================================
// Fragment Templates (AJAX responses, no base.html)
// ============================================================================

/// Driver cards fragment.
#[derive(Template)]
#[template(path = "driver_list.html")]
pub struct DriverListTemplate {
    pub drivers: Vec<DriverCardView>,
    pub empty_message: &'static str,
}

/// Open ride requests fragment.
#[derive(Template)]
#[template(path = "ride_requests.html")]
pub struct RideRequestListTemplate {
    pub requests: Vec<RideRequestView>,
}

// ============================================================================
// View Models (for templates)
// ============================================================================

/// The signed-in user, for the header.
#[derive(Debug, Clone)]
pub struct UserView {
    pub email: String,
    pub is_driver: bool,
}

impl UserView {
    pub fn from_session(session: &Session) -> Self {
        Self {
            email: session.email.clone(),
            is_driver: session.is_driver(),
        }
    }
}

/// One displayed time window and the routes offered in it.
#[derive(Debug, Clone)]
pub struct SlotView {
    pub label: String,
    pub routes: Vec<String>,
}

/// A driver card.
#[derive(Debug, Clone)]
pub struct DriverCardView {
    pub name: String,
    pub initial: char,
    pub car_model: String,
    pub contact: String,
    pub rides_offered: u32,
    pub is_subscribed: bool,
    pub discount: Option<u8>,
    pub slots: Vec<SlotView>,
}

impl DriverCardView {
    pub fn from_driver(driver: &Driver, slots: &[TimeSlotGroup]) -> Self {
        Self {
            name: driver.name.clone(),
            initial: driver.initial(),
            car_model: driver.car_model.clone(),
            contact: driver.contact.clone(),
            rides_offered: driver.rides_offered,
            is_subscribed: driver.is_subscribed,
            discount: driver.discount_percentage(),
            slots: slots
                .iter()
                .map(|g| SlotView {
                    label: g.label.clone(),
                    routes: g
                        .iter()
                        .map(|e| route_label(&e.from_area, &e.to_area))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// An open ride request.
#[derive(Debug, Clone)]
pub struct RideRequestView {
    pub rider_name: String,
    pub contact: String,
    pub route: String,
    pub date: String,
    pub window: String,
}

impl RideRequestView {
    pub fn from_request(request: &RideRequest) -> Self {
        Self {
            rider_name: request.rider_name.clone(),
            contact: request.contact.clone(),
            route: route_label(&request.from_area, &request.to_area),
            date: request.date.format("%a %-d %b").to_string(),
            window: window_label(&request.start_time, &request.end_time),
        }
    }
}

fn route_label(from: &str, to: &str) -> String {
    format!("{from} → {to}")
}

fn window_label(start: &SlotTime, end: &SlotTime) -> String {
    format!("{} - {}", start.display(), end.display())
}

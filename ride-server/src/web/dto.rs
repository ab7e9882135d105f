//! Data transfer objects for web requests and responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::{Session, UserRole};
use crate::domain::{Availability, Driver, RideRequest};
use crate::offers::{OfferForm, PublishedOffer};
use crate::slots::TimeSlotGroup;

/// Query for a dated ride search.
#[derive(Debug, Deserialize)]
pub struct RideSearchRequest {
    /// Date in YYYY-MM-DD format
    pub date: NaiveDate,

    /// Origin area substring; blank matches any
    #[serde(default)]
    pub from: String,

    /// Destination area substring; blank matches any
    #[serde(default)]
    pub to: String,
}

/// Credentials posted to the sign-in form.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Sign-up form. The role defaults to rider.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// The driver offer form.
///
/// HTML checkboxes post `on` when ticked and nothing otherwise.
#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub name: String,
    pub contact: String,
    pub car_model: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub discount_enabled: Option<String>,
    #[serde(default)]
    pub discount_percentage: Option<u8>,
}

impl From<OfferRequest> for OfferForm {
    fn from(req: OfferRequest) -> Self {
        let discount_enabled = req
            .discount_enabled
            .as_deref()
            .is_some_and(|v| matches!(v, "on" | "true" | "1"));
        OfferForm {
            name: req.name,
            contact: req.contact,
            car_model: req.car_model,
            from_area: req.from_area,
            to_area: req.to_area,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            discount_enabled,
            discount_percentage: req.discount_percentage.unwrap_or(0),
        }
    }
}

/// A rider's ride request form.
#[derive(Debug, Deserialize)]
pub struct RideRequestForm {
    pub rider_name: String,
    pub contact: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

/// An availability entry in results.
#[derive(Debug, Serialize)]
pub struct AvailabilityResult {
    pub id: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,

    /// Raw backend value, e.g. "09:00"
    pub start_time: String,
    pub end_time: String,
}

impl AvailabilityResult {
    pub fn from_availability(entry: &Availability) -> Self {
        Self {
            id: entry.id.clone(),
            from_area: entry.from_area.clone(),
            to_area: entry.to_area.clone(),
            date: entry.date,
            start_time: entry.start_time.as_str().to_string(),
            end_time: entry.end_time.as_str().to_string(),
        }
    }
}

/// Entries sharing a displayed window.
#[derive(Debug, Serialize)]
pub struct SlotResult {
    /// e.g. "9:00 AM - 9:30 AM"
    pub label: String,
    pub entries: Vec<AvailabilityResult>,
}

impl SlotResult {
    pub fn from_group(group: &TimeSlotGroup) -> Self {
        Self {
            label: group.label.clone(),
            entries: group.iter().map(AvailabilityResult::from_availability).collect(),
        }
    }
}

/// A matched driver with their matching windows.
#[derive(Debug, Serialize)]
pub struct DriverResult {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub car_model: String,
    pub rides_offered: u32,
    pub is_subscribed: bool,

    /// Active discount, if any
    pub discount_percentage: Option<u8>,

    pub slots: Vec<SlotResult>,
}

impl DriverResult {
    pub fn from_driver(driver: &Driver, slots: &[TimeSlotGroup]) -> Self {
        Self {
            id: driver.id.to_string(),
            name: driver.name.clone(),
            contact: driver.contact.clone(),
            car_model: driver.car_model.clone(),
            rides_offered: driver.rides_offered,
            is_subscribed: driver.is_subscribed,
            discount_percentage: driver.discount_percentage(),
            slots: slots.iter().map(SlotResult::from_group).collect(),
        }
    }
}

/// Response for driver listings and searches.
#[derive(Debug, Serialize)]
pub struct DriverListResponse {
    pub drivers: Vec<DriverResult>,

    /// When the driver snapshot was last refreshed
    pub refreshed_at: Option<String>,

    /// Set when the last refresh failed; results may be stale
    pub stale_reason: Option<String>,
}

/// A ride request in results.
#[derive(Debug, Serialize)]
pub struct RideRequestResult {
    pub id: String,
    pub rider_name: String,
    pub contact: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
}

impl RideRequestResult {
    pub fn from_request(request: &RideRequest) -> Self {
        Self {
            id: request.id.clone(),
            rider_name: request.rider_name.clone(),
            contact: request.contact.clone(),
            from_area: request.from_area.clone(),
            to_area: request.to_area.clone(),
            date: request.date,
            start_time: request.start_time.as_str().to_string(),
            end_time: request.end_time.as_str().to_string(),
            status: request.status.to_string(),
        }
    }
}

/// Response for open ride requests.
#[derive(Debug, Serialize)]
pub struct RideRequestListResponse {
    pub requests: Vec<RideRequestResult>,
    pub stale_reason: Option<String>,
}

/// The signed-in user.
#[derive(Debug, Serialize)]
pub struct SessionResult {
    pub user_id: String,
    pub email: String,
    pub role: Option<UserRole>,
}

impl SessionResult {
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id.to_string(),
            email: session.email.clone(),
            role: session.role,
        }
    }
}

/// Response to sign-up.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignUpResponse {
    SignedIn { user: SessionResult },
    ConfirmationRequired { email: String },
}

/// Response to a published offer.
#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub driver: DriverResult,
    pub availability: AvailabilityResult,
}

impl OfferResponse {
    pub fn from_published(published: &PublishedOffer) -> Self {
        Self {
            driver: DriverResult::from_driver(&published.driver, &[]),
            availability: AvailabilityResult::from_availability(&published.availability),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(discount_enabled: Option<&str>, pct: Option<u8>) -> OfferRequest {
        OfferRequest {
            name: "Asha".into(),
            contact: "+1".into(),
            car_model: "Civic".into(),
            from_area: "Downtown".into(),
            to_area: "Airport".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            start_time: "09:00".into(),
            end_time: "10:00".into(),
            discount_enabled: discount_enabled.map(str::to_string),
            discount_percentage: pct,
        }
    }

    #[test]
    fn checkbox_values() {
        assert!(OfferForm::from(offer(Some("on"), Some(10))).discount_enabled);
        assert!(OfferForm::from(offer(Some("true"), None)).discount_enabled);
        assert!(!OfferForm::from(offer(None, Some(10))).discount_enabled);
        assert!(!OfferForm::from(offer(Some("off"), None)).discount_enabled);
        assert_eq!(OfferForm::from(offer(None, None)).discount_percentage, 0);
    }

    #[test]
    fn sign_up_response_is_tagged() {
        let json = serde_json::to_value(SignUpResponse::ConfirmationRequired {
            email: "a@example.com".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "confirmation_required");
        assert_eq!(json["email"], "a@example.com");
    }
}

//! Backend row DTOs.
//!
//! These map directly to the REST and auth JSON payloads. Columns are
//! `Option` wherever the schema allows null or older rows omit them.

use serde::{Deserialize, Serialize};

/// A `drivers` row with its embedded `availability` and `discounts`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverRow {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub car_model: Option<String>,
    pub rides_offered: Option<i64>,
    pub is_subscribed: Option<bool>,
    pub is_on_ride: Option<bool>,
    #[serde(default)]
    pub availability: Vec<AvailabilityRow>,
    /// One-to-one embeds come back as an object or a one-element array
    /// depending on how the relationship is declared.
    #[serde(default)]
    pub discounts: Option<OneOrMany<DiscountRow>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvailabilityRow {
    pub id: String,
    pub driver_id: String,
    pub from_area: String,
    pub to_area: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscountRow {
    pub enabled: Option<bool>,
    /// Stored as numeric; some clients write fractional values.
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(t) => Some(t),
            OneOrMany::Many(ts) => ts.first(),
        }
    }
}

/// A `ride_requests` row.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RideRequestRow {
    pub id: String,
    pub rider_id: String,
    pub rider_name: Option<String>,
    pub contact: Option<String>,
    pub from_area: String,
    pub to_area: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
}

/// Body for upserting a driver.
#[derive(Debug, Clone, Serialize)]
pub struct DriverWrite<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub contact: &'a str,
    pub car_model: &'a str,
    pub rides_offered: u32,
    pub is_subscribed: bool,
    pub is_on_ride: bool,
}

/// Body for inserting an availability entry.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityWrite<'a> {
    pub driver_id: &'a str,
    pub from_area: &'a str,
    pub to_area: &'a str,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

/// Body for upserting a discount.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountWrite<'a> {
    pub driver_id: &'a str,
    pub enabled: bool,
    pub percentage: u8,
}

/// Body for inserting a ride request.
#[derive(Debug, Clone, Serialize)]
pub struct RideRequestWrite<'a> {
    pub rider_id: &'a str,
    pub rider_name: &'a str,
    pub contact: &'a str,
    pub from_area: &'a str,
    pub to_area: &'a str,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: &'static str,
}

/// Email/password credentials for the auth endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
    /// Stored as user metadata on sign-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Token response from `/auth/v1/token` and (when confirmation is off)
/// `/auth/v1/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub user: Option<AuthUser>,
    /// Sign-up with confirmation returns the bare user instead.
    pub id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Error body from the REST or auth API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error_description: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
    }
}

/// Response from the checkout function.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

//! Conversion from backend DTOs to domain types.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::auth::{Claims, Session, UserRole};
use crate::domain::{Availability, Discount, Driver, DriverId, RideRequest, RideStatus, SlotTime};

use super::types::{AuthResponse, AvailabilityRow, DriverRow, OneOrMany, RideRequestRow};

/// Error during DTO to domain conversion. Names the offending row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("{table} {id}: invalid date {value:?}")]
    InvalidDate {
        table: &'static str,
        id: String,
        value: String,
    },

    #[error("{table} {id}: invalid {field} {value}")]
    InvalidValue {
        table: &'static str,
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("{table} {id}: missing {field}")]
    MissingField {
        table: &'static str,
        id: String,
        field: &'static str,
    },
}

fn parse_date(table: &'static str, id: &str, value: &str) -> Result<NaiveDate, ConversionError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConversionError::InvalidDate {
        table,
        id: id.to_string(),
        value: value.to_string(),
    })
}

/// Convert an availability row. Times are kept verbatim; unparseable
/// times render as a placeholder rather than dropping the entry.
pub fn convert_availability(row: &AvailabilityRow) -> Result<Availability, ConversionError> {
    Ok(Availability {
        id: row.id.clone(),
        driver_id: DriverId::new(row.driver_id.clone()),
        from_area: row.from_area.clone(),
        to_area: row.to_area.clone(),
        date: parse_date("availability", &row.id, &row.date)?,
        start_time: SlotTime::new(row.start_time.clone()),
        end_time: SlotTime::new(row.end_time.clone()),
    })
}

/// Convert a driver row with its embedded availability and discount.
///
/// Availability entries that fail to convert are skipped with a warning
/// so one bad entry does not hide the driver.
pub fn convert_driver(row: &DriverRow) -> Result<Driver, ConversionError> {
    let rides_offered = match row.rides_offered {
        None => 0,
        Some(n) => u32::try_from(n).map_err(|_| ConversionError::InvalidValue {
            table: "drivers",
            id: row.id.clone(),
            field: "rides_offered",
            value: n.to_string(),
        })?,
    };

    let availability = row
        .availability
        .iter()
        .filter_map(|a| match convert_availability(a) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, driver = %row.id, "skipping availability entry");
                None
            }
        })
        .collect();

    let discount = match row.discounts.as_ref().and_then(OneOrMany::first) {
        None => None,
        Some(d) => {
            let raw = d.percentage.unwrap_or(0.0);
            let invalid = || ConversionError::InvalidValue {
                table: "discounts",
                id: row.id.clone(),
                field: "percentage",
                value: raw.to_string(),
            };
            if !(0.0..=100.0).contains(&raw) {
                return Err(invalid());
            }
            Some(Discount::new(d.enabled.unwrap_or(false), raw.round() as u8).map_err(|_| invalid())?)
        }
    };

    Ok(Driver {
        id: DriverId::new(row.id.clone()),
        name: row.name.clone(),
        contact: row.contact.clone().unwrap_or_default(),
        car_model: row.car_model.clone().unwrap_or_default(),
        rides_offered,
        is_subscribed: row.is_subscribed.unwrap_or(false),
        is_on_ride: row.is_on_ride.unwrap_or(false),
        availability,
        discount,
    })
}

/// Convert a list of driver rows, skipping (and logging) bad ones.
pub fn convert_drivers(rows: &[DriverRow]) -> Vec<Driver> {
    rows.iter()
        .filter_map(|row| match convert_driver(row) {
            Ok(driver) => Some(driver),
            Err(e) => {
                tracing::warn!(error = %e, "skipping driver row");
                None
            }
        })
        .collect()
}

pub fn convert_ride_request(row: &RideRequestRow) -> Result<RideRequest, ConversionError> {
    let status: RideStatus = row.status.parse().map_err(|_| ConversionError::InvalidValue {
        table: "ride_requests",
        id: row.id.clone(),
        field: "status",
        value: row.status.clone(),
    })?;

    Ok(RideRequest {
        id: row.id.clone(),
        rider_id: row.rider_id.clone(),
        rider_name: row.rider_name.clone().unwrap_or_default(),
        contact: row.contact.clone().unwrap_or_default(),
        from_area: row.from_area.clone(),
        to_area: row.to_area.clone(),
        date: parse_date("ride_requests", &row.id, &row.date)?,
        start_time: SlotTime::new(row.start_time.clone()),
        end_time: SlotTime::new(row.end_time.clone()),
        status,
    })
}

pub fn convert_ride_requests(rows: &[RideRequestRow]) -> Vec<RideRequest> {
    rows.iter()
        .filter_map(|row| match convert_ride_request(row) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::warn!(error = %e, "skipping ride request row");
                None
            }
        })
        .collect()
}

/// Build a session from a token response.
///
/// Falls back to the access token's own claims for the user id and expiry
/// when the response omits them.
pub fn convert_session(resp: &AuthResponse, now: DateTime<Utc>) -> Result<Session, ConversionError> {
    let missing = |field| ConversionError::MissingField {
        table: "auth",
        id: resp
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .unwrap_or_else(|| "session".to_string()),
        field,
    };

    let access_token = resp.access_token.clone().ok_or_else(|| missing("access_token"))?;
    let claims = Claims::decode(&access_token).ok();

    let user_id = resp
        .user
        .as_ref()
        .map(|u| u.id.clone())
        .or_else(|| claims.as_ref().map(|c| c.sub.clone()))
        .ok_or_else(|| missing("user.id"))?;

    let email = resp
        .user
        .as_ref()
        .and_then(|u| u.email.clone())
        .or_else(|| claims.as_ref().and_then(|c| c.email.clone()))
        .unwrap_or_default();

    let role = resp
        .user
        .as_ref()
        .and_then(|u| u.user_metadata.get("role"))
        .and_then(|r| r.as_str())
        .and_then(|r| r.parse::<UserRole>().ok());

    let expires_at = resp
        .expires_at
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| {
            resp.expires_in
                .map(|secs| now + chrono::Duration::seconds(secs))
        })
        .or_else(|| claims.as_ref().and_then(Claims::expires_at));

    Ok(Session {
        user_id: DriverId::new(user_id),
        email,
        role,
        access_token,
        refresh_token: resp.refresh_token.clone(),
        expires_at,
    })
}

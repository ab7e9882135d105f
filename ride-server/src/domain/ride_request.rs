//! Rider-posted ride requests.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::driver::{parse_window, require};
use super::error::DomainError;
use super::time::{ClockTime, SlotTime};

/// Lifecycle status of a ride request.
///
/// Transitions are owned by the backend and other actors; this client only
/// ever creates `Pending` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Pending,
    Accepted,
    Completed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ride status: {0}")]
pub struct InvalidRideStatus(pub String);

impl FromStr for RideStatus {
    type Err = InvalidRideStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RideStatus::Pending),
            "accepted" => Ok(RideStatus::Accepted),
            "completed" => Ok(RideStatus::Completed),
            other => Err(InvalidRideStatus(other.to_string())),
        }
    }
}

/// A desired trip, visible to drivers until claimed or expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RideRequest {
    pub id: String,
    pub rider_id: String,
    pub rider_name: String,
    pub contact: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub status: RideStatus,
}

/// A ride request to insert. Always created as `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRideRequest {
    pub rider_id: String,
    pub rider_name: String,
    pub contact: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl NewRideRequest {
    /// Build and validate a request from form input.
    #[allow(clippy::too_many_arguments)]
    pub fn parse(
        rider_id: impl Into<String>,
        rider_name: &str,
        contact: &str,
        from_area: &str,
        to_area: &str,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self, DomainError> {
        require("rider_name", rider_name)?;
        require("contact", contact)?;
        require("from_area", from_area)?;
        require("to_area", to_area)?;
        let (start_time, end_time) = parse_window(start_time, end_time)?;

        Ok(Self {
            rider_id: rider_id.into(),
            rider_name: rider_name.trim().to_string(),
            contact: contact.trim().to_string(),
            from_area: from_area.trim().to_string(),
            to_area: to_area.trim().to_string(),
            date,
            start_time,
            end_time,
        })
    }

    pub fn status(&self) -> RideStatus {
        RideStatus::Pending
    }
}

//! Driver, availability and discount types.

use std::fmt;

use chrono::NaiveDate;

use super::error::DomainError;
use super::time::{ClockTime, SlotTime};

/// Backend identity of a driver (the authenticated user's id).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(String);

impl DriverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DriverId({})", self.0)
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A window during which a driver offers a ride.
///
/// Belongs to exactly one driver. Read-only from the rider's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub id: String,
    pub driver_id: DriverId,
    /// Origin area (free text)
    pub from_area: String,
    /// Destination area (free text)
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
}

impl Availability {
    /// Parsed end time, if the backend value is well formed.
    pub fn end(&self) -> Option<ClockTime> {
        self.end_time.parse().ok()
    }

    /// Parsed start time, if the backend value is well formed.
    pub fn start(&self) -> Option<ClockTime> {
        self.start_time.parse().ok()
    }
}

/// A driver's discount offer. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discount {
    enabled: bool,
    percentage: u8,
}

impl Discount {
    /// Create a discount, rejecting percentages above 100.
    pub fn new(enabled: bool, percentage: u8) -> Result<Self, DomainError> {
        if percentage > 100 {
            return Err(DomainError::InvalidDiscount(percentage));
        }
        Ok(Self {
            enabled,
            percentage,
        })
    }

    /// No discount.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            percentage: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// The percentage to advertise, if the discount is switched on and non-zero.
    pub fn active_percentage(&self) -> Option<u8> {
        (self.enabled && self.percentage > 0).then_some(self.percentage)
    }
}

/// A driver as projected from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    /// Phone/WhatsApp handle
    pub contact: String,
    pub car_model: String,
    pub rides_offered: u32,
    /// Verified / unlimited-offers subscription
    pub is_subscribed: bool,
    /// Currently on a ride; never matched
    pub is_on_ride: bool,
    pub availability: Vec<Availability>,
    pub discount: Option<Discount>,
}

impl Driver {
    /// First character of the name, for avatar badges.
    pub fn initial(&self) -> char {
        self.name.chars().next().unwrap_or('?')
    }

    /// Active discount percentage, if any.
    pub fn discount_percentage(&self) -> Option<u8> {
        self.discount.and_then(|d| d.active_percentage())
    }

    /// The profile fields a driver edits, detached from availability.
    pub fn profile(&self) -> DriverProfile {
        DriverProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            contact: self.contact.clone(),
            car_model: self.car_model.clone(),
            rides_offered: self.rides_offered,
            is_subscribed: self.is_subscribed,
            is_on_ride: self.is_on_ride,
        }
    }
}

/// Driver row as written by the offer form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverProfile {
    pub id: DriverId,
    pub name: String,
    pub contact: String,
    pub car_model: String,
    pub rides_offered: u32,
    pub is_subscribed: bool,
    pub is_on_ride: bool,
}

impl DriverProfile {
    /// A brand new driver: no rides offered, not subscribed, not on a ride.
    pub fn new(
        id: DriverId,
        name: impl Into<String>,
        contact: impl Into<String>,
        car_model: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            contact: contact.into(),
            car_model: car_model.into(),
            rides_offered: 0,
            is_subscribed: false,
            is_on_ride: false,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require("name", &self.name)?;
        require("contact", &self.contact)?;
        require("car_model", &self.car_model)?;
        Ok(())
    }
}

/// An availability entry to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAvailability {
    pub driver_id: DriverId,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl NewAvailability {
    /// Build and validate an entry from form input.
    pub fn parse(
        driver_id: DriverId,
        from_area: &str,
        to_area: &str,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self, DomainError> {
        require("from_area", from_area)?;
        require("to_area", to_area)?;
        let (start_time, end_time) = parse_window(start_time, end_time)?;

        Ok(Self {
            driver_id,
            from_area: from_area.trim().to_string(),
            to_area: to_area.trim().to_string(),
            date,
            start_time,
            end_time,
        })
    }
}

/// Reject blank text fields.
pub(super) fn require(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::EmptyField(field));
    }
    Ok(())
}

/// Parse a start/end pair, requiring `start <= end`.
pub(super) fn parse_window(start: &str, end: &str) -> Result<(ClockTime, ClockTime), DomainError> {
    let start_time = ClockTime::parse(start.trim()).map_err(|_| DomainError::InvalidTime {
        field: "start_time",
        value: start.to_string(),
    })?;
    let end_time = ClockTime::parse(end.trim()).map_err(|_| DomainError::InvalidTime {
        field: "end_time",
        value: end.to_string(),
    })?;
    if end_time < start_time {
        return Err(DomainError::EndBeforeStart {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok((start_time, end_time))
}

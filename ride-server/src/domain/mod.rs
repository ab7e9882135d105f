//! Domain types for the ride marketplace.
//!
//! These are read-only projections of backend rows plus the validated
//! write-side payloads. Nothing downstream mutates a fetched snapshot.

mod driver;
mod error;
mod ride_request;
mod search;
mod time;

pub use driver::{Availability, Discount, Driver, DriverId, DriverProfile, NewAvailability};
pub use error::DomainError;
pub use ride_request::{InvalidRideStatus, NewRideRequest, RideRequest, RideStatus};
pub use search::{Now, SearchParams};
pub use time::{ClockTime, SlotTime, TimeError, UNPARSEABLE_TIME, format_12h};

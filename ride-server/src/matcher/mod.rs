//! Availability matching.
//!
//! Decides which drivers satisfy a rider's search, including the
//! "available now" mode used on the home page, and which ride requests
//! are still open for drivers.

mod query;
mod requests;
mod rules;

pub use query::MatchQuery;
pub use requests::{is_open, open_ride_requests};
pub use rules::{match_driver_refs, match_drivers, matching_entries};

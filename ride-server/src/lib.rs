//! Ride-sharing marketplace server.
//!
//! Riders find drivers offering a ride between two areas at a time that
//! suits them; drivers publish availability windows and discounts and pick
//! up open ride requests. Results are kept fresh from the backend's
//! change feed and a periodic refresh.

pub mod auth;
pub mod backend;
pub mod config;
pub mod domain;
pub mod matcher;
pub mod offers;
pub mod realtime;
pub mod refresh;
pub mod slots;
pub mod web;

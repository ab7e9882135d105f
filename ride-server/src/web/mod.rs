//! Web layer for the ride marketplace.
//!
//! Serves the home page, ride search, ride requests, offer publication,
//! sign-in and checkout. Listing endpoints return HTML when the client
//! accepts it and JSON otherwise.

mod dto;
mod routes;
mod state;
pub mod templates;

pub use dto::*;
pub use routes::{AppError, SESSION_COOKIE, create_router};
pub use state::{AppState, DRIVER_TABLES, change_interests};
pub use templates::*;

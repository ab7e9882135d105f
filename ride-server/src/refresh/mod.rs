//! Live result refresh.
//!
//! A [`RefreshController`] keeps one view fresh: it fetches on spawn, on a
//! fixed interval, on demand and on relevant change notifications, and
//! publishes results through a `watch` channel. Results are applied in
//! start order. New parameters supersede an in-flight fetch; other
//! triggers queue a single follow-up fetch.

mod config;
mod controller;
mod sources;

pub use config::{DEFAULT_INTERVAL, RefreshConfig};
pub use controller::{ChangeSource, Fetch, RefreshController, RefreshHandle, View};
pub use sources::{DriverFeed, PendingRequestFeed};

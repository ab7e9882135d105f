//! Row-change notifications.
//!
//! [`ChangeFeed`] listens to the backend's realtime channel and publishes
//! onto a [`ChangeBus`]; refresh loops subscribe with a [`ChangeInterest`]
//! and re-fetch when a relevant change arrives.

mod event;
mod feed;
mod interest;

pub use event::{ChangeBus, ChangeEvent, ChangeKind};
pub use feed::{ChangeFeed, RealtimeConfig, RealtimeError, ReconnectConfig};
pub use interest::{ChangeInterest, InvalidRowFilter, RowFilter};

//! Refresh controller configuration.

use std::time::Duration;

use crate::backend::RetryPolicy;

/// Default periodic refresh interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`RefreshController`](super::RefreshController).
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between periodic refreshes
    pub interval: Duration,
    /// Retry applied to each fetch before a failure is surfaced
    pub retry: RetryPolicy,
}

impl RefreshConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

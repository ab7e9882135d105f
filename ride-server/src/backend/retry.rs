//! Bounded retry for transient failures.

use std::future::Future;
use std::time::Duration;

/// How many extra attempts to make, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// A single retry after `delay`.
    pub const fn once(delay: Duration) -> Self {
        Self { retries: 1, delay }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once(Duration::from_millis(500))
    }
}

/// Run `op`, retrying while `is_transient` holds and the policy allows.
///
/// Non-transient errors are returned immediately.
pub async fn with_retry<T, E, Fut>(
    policy: RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut op: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.retries && is_transient(&e) => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, "transient failure, retrying");
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Backend error types.

use super::convert::ConversionError;
use crate::domain::DomainError;

/// Errors from the backend clients.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Credentials were rejected or the session has expired
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A write was attempted without a signed-in session
    #[error("you must be signed in to do that")]
    AuthRequired,

    #[error("rate limited by backend")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    /// A row could not be converted to a domain value
    #[error("bad row from backend: {0}")]
    Conversion(#[from] ConversionError),

    /// Input failed validation before reaching the backend
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Mock data could not be loaded or saved
    #[error("mock data error: {0}")]
    MockData(String),
}

impl BackendError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            BackendError::Api { status, .. } => *status >= 500,
            BackendError::RateLimited => true,
            _ => false,
        }
    }

    /// Whether the user has to (re-)authenticate.
    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_) | BackendError::AuthRequired)
    }
}

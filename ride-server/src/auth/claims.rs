//! Access token claims.
//!
//! The token is only decoded, never verified: the backend verifies it on
//! every request. We read `sub` and `exp` when the auth response leaves
//! them out.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Error decoding a token payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid access token: {reason}")]
pub struct ClaimsError {
    reason: &'static str,
}

impl ClaimsError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// The claims we use from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: Option<i64>,
    pub email: Option<String>,
}

impl Claims {
    /// Decode the payload segment of a JWT.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ClaimsError::new("expected three segments"));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| ClaimsError::new("payload is not base64url"))?;
        serde_json::from_slice(&bytes).map_err(|_| ClaimsError::new("payload is not a claims object"))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

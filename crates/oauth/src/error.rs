use thiserror::Error;

use crate::store::StoreError;

/// Status the vendor uses for a missing, expired or revoked bearer token.
pub const INVALID_TOKEN_STATUS: i64 = 401;

#[derive(Debug, Error)]
pub enum Error {
    /// No stored shared secret and none could be obtained.
    #[error("shared secret unavailable: {0}")]
    SecretUnavailable(String),

    /// The vendor answered with a non-zero `status`.
    #[error("vendor call `{action}` failed with status {status}: {message}")]
    VendorApi {
        action: String,
        status: i64,
        message: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed vendor response for `{action}`: {reason}")]
    MalformedResponse { action: String, reason: String },

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether the vendor rejected the bearer token of an authorized call.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::VendorApi { status, .. } if *status == INVALID_TOKEN_STATUS)
    }

    pub(crate) fn malformed(action: &str, reason: impl std::fmt::Display) -> Self {
        Self::MalformedResponse {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

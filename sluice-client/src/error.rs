//! Error types for the Sluice clients

use crate::coord::LeaseId;
use thiserror::Error;

/// Result type alias for coordination-store operations
pub type Result<T> = std::result::Result<T, CoordError>;

/// Errors that can occur talking to the coordination store
#[derive(Debug, Error)]
pub enum CoordError {
    /// HTTP request to the store failed
    #[error("coordination-store request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Store returned an error status code
    #[error("coordination-store error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the store
        message: String,
    },

    /// Failed to decode a store response
    #[error("failed to decode coordination-store response: {0}")]
    DecodeError(String),

    /// The lease no longer exists on the store
    #[error("lease {0} expired or was revoked")]
    LeaseExpired(LeaseId),

    /// Store is unreachable or refused the operation
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
}

impl CoordError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }
}

//! Worker error taxonomy
//!
//! Every variant is terminal: the worker never retries or recovers
//! internally. The process supervisor restarts the pod and the whole
//! bootstrap sequence re-runs from scratch.

use sluice_client::CoordError;
use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Fatal worker errors
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A required configuration value is missing or invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The pipeline key did not resolve to exactly one record
    #[error("pipeline lookup at {key:?} expected 1 entry, found {found}")]
    Lookup { key: String, found: usize },

    /// The stored pipeline record could not be decoded
    #[error("malformed pipeline record at {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// An operation against the coordination store exceeded its bound
    #[error("{op} exceeded its {secs}s deadline")]
    DeadlineExceeded { op: &'static str, secs: u64 },

    /// Lease grant, keepalive start, or registration publish failed
    #[error("registration failed during {op}: {source}")]
    Registration {
        op: &'static str,
        #[source]
        source: CoordError,
    },

    /// Coordination-store failure outside the registration path
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// The worker service failed to start or its serving loop died
    #[error("worker service failed: {0}")]
    Service(String),
}

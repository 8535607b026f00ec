//! Pipeline types
//!
//! The coordination store holds one record per pipeline under
//! `{prefix}/pipelines/{name}`. Workers resolve that record into
//! [`PipelineMetadata`] during bootstrap.

use serde::{Deserialize, Serialize};

/// Lifecycle state the controller records for a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Starting,
    #[default]
    Running,
    Paused,
    Failing,
}

/// Pipeline record stored in the coordination store
///
/// Written by the pipeline controller whenever a pipeline is created or
/// updated. Workers read it once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Monotonically increasing pipeline version
    pub version: u64,
    /// Commit holding the pipeline spec this record was written for
    pub spec_commit: String,
    /// Token the worker uses for protected pipeline-API calls
    pub auth_token: String,
    /// State the controller last recorded for the pipeline
    #[serde(default)]
    pub state: PipelineState,
}

/// Pipeline metadata as seen by a running worker
///
/// Resolved once per process from the stored [`PipelineRecord`] and read-only
/// thereafter. `spec_commit` is always the commit this worker was provisioned
/// with, never the stored one: the record may have been updated while the
/// worker pod was being created, and the worker must not run the transform of
/// one pipeline version inside the image of another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub pipeline: String,
    pub version: u64,
    pub spec_commit: String,
    pub auth_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decodes_from_stored_json() {
        let raw =
            br#"{"version":3,"spec_commit":"abc123","auth_token":"secret","state":"paused"}"#;
        let record: PipelineRecord = serde_json::from_slice(raw).unwrap();
        assert_eq!(record.version, 3);
        assert_eq!(record.spec_commit, "abc123");
        assert_eq!(record.auth_token, "secret");
        assert_eq!(record.state, PipelineState::Paused);
    }

    #[test]
    fn test_record_without_state_defaults_to_running() {
        let raw = br#"{"version":1,"spec_commit":"abc","auth_token":"tok"}"#;
        let record: PipelineRecord = serde_json::from_slice(raw).unwrap();
        assert_eq!(record.state, PipelineState::Running);
    }

    #[test]
    fn test_record_rejects_malformed_data() {
        let raw = b"\x00\x01not json";
        assert!(serde_json::from_slice::<PipelineRecord>(raw).is_err());
    }
}

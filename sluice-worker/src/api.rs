//! Worker RPC surface
//!
//! The worker serves a fixed interface on a fixed port. The handlers that do
//! the actual pipeline work hang off the state assembled here; this module
//! only wires the router the bootstrap starts.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sluice_client::ApiClient;
use sluice_core::PipelineMetadata;
use std::sync::Arc;

/// Fixed port every worker serves on
pub const WORKER_PORT: u16 = 7710;

/// Shared state behind the worker's handlers
#[derive(Clone)]
pub struct WorkerState {
    /// Resolved pipeline metadata, read-only for the process lifetime
    pub metadata: Arc<PipelineMetadata>,
    /// Pipeline-API client, authenticated during the metadata fetch
    pub api: Arc<ApiClient>,
    pub pod_name: String,
    pub namespace: String,
}

/// Builds the worker's router
pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct WorkerStatus {
    pipeline: String,
    version: u64,
    spec_commit: String,
    pod_name: String,
    namespace: String,
    authenticated: bool,
}

async fn status(State(state): State<WorkerState>) -> Json<WorkerStatus> {
    Json(WorkerStatus {
        pipeline: state.metadata.pipeline.clone(),
        version: state.metadata.version,
        spec_commit: state.metadata.spec_commit.clone(),
        pod_name: state.pod_name.clone(),
        namespace: state.namespace.clone(),
        authenticated: state.api.auth_token().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> WorkerState {
        WorkerState {
            metadata: Arc::new(PipelineMetadata {
                pipeline: "edges".to_string(),
                version: 2,
                spec_commit: "local456".to_string(),
                auth_token: "tok".to_string(),
            }),
            api: Arc::new(ApiClient::new("http://localhost:7650")),
            pod_name: "pipeline-edges-v2-abcde".to_string(),
            namespace: "default".to_string(),
        }
    }

    #[tokio::test]
    async fn test_status_reports_worker_identity() {
        let state = test_state();
        state.api.set_auth_token("tok");

        let Json(status) = status(State(state)).await;
        assert_eq!(status.pipeline, "edges");
        assert_eq!(status.version, 2);
        assert_eq!(status.spec_commit, "local456");
        assert!(status.authenticated);
    }

    #[tokio::test]
    async fn test_status_before_auth_is_unauthenticated() {
        let Json(status) = status(State(test_state())).await;
        assert!(!status.authenticated);
    }
}

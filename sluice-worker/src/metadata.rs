//! Pipeline metadata fetch
//!
//! First networked step of the bootstrap: read this pipeline's record from
//! the coordination store, authenticate the pipeline-API client with the
//! record's token, and resolve the worker-side metadata.

use crate::error::{Result, WorkerError};
use sluice_client::{ApiClient, CoordStore};
use sluice_core::keys;
use sluice_core::{PipelineMetadata, PipelineRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bound on the whole fetch, including the store round trip
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves and resolves this worker's pipeline metadata
pub struct MetadataFetcher {
    coord: Arc<dyn CoordStore>,
    api: Arc<ApiClient>,
    prefix: String,
}

impl MetadataFetcher {
    /// Creates a fetcher reading under `prefix`
    pub fn new(coord: Arc<dyn CoordStore>, api: Arc<ApiClient>, prefix: impl Into<String>) -> Self {
        Self {
            coord,
            api,
            prefix: prefix.into(),
        }
    }

    /// Fetches the pipeline record and resolves [`PipelineMetadata`]
    ///
    /// Side effect: attaches the record's auth token to the pipeline-API
    /// client, so every later protected call is authenticated as the
    /// pipeline.
    ///
    /// The returned metadata always carries `local_spec_commit`, not the
    /// stored commit: the record may have advanced while this pod was being
    /// created, and the worker must only run the version its image was built
    /// from.
    pub async fn fetch(
        &self,
        pipeline_name: &str,
        local_spec_commit: &str,
    ) -> Result<PipelineMetadata> {
        match tokio::time::timeout(
            FETCH_TIMEOUT,
            self.fetch_inner(pipeline_name, local_spec_commit),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WorkerError::DeadlineExceeded {
                op: "pipeline metadata fetch",
                secs: FETCH_TIMEOUT.as_secs(),
            }),
        }
    }

    async fn fetch_inner(
        &self,
        pipeline_name: &str,
        local_spec_commit: &str,
    ) -> Result<PipelineMetadata> {
        let key = keys::pipeline_key(&self.prefix, pipeline_name);
        let entries = self.coord.get(&key).await?;

        if entries.len() != 1 {
            return Err(WorkerError::Lookup {
                key,
                found: entries.len(),
            });
        }

        let record: PipelineRecord = serde_json::from_slice(&entries[0].value)
            .map_err(|source| WorkerError::Decode { key, source })?;
        debug!(pipeline = pipeline_name, version = record.version, "decoded pipeline record");

        self.api.set_auth_token(&record.auth_token);

        Ok(PipelineMetadata {
            pipeline: pipeline_name.to_string(),
            version: record.version,
            spec_commit: local_spec_commit.to_string(),
            auth_token: record.auth_token,
        })
    }
}

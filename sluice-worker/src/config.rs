//! Worker configuration
//!
//! All inputs come from the environment the controller provisions the pod
//! with. Everything here is required and validated before the worker touches
//! the network; a missing value fails the process immediately.

use crate::error::{Result, WorkerError};

const DEFAULT_API_ADDR: &str = "http://localhost:7650";

/// Immutable process-wide configuration
///
/// Built once in `main` and passed by reference to each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the coordination store's JSON gateway
    pub coord_addr: String,

    /// Address of the pipeline API (the sidecar next to this worker)
    pub api_addr: String,

    /// Key-space prefix for all Sluice records in the coordination store
    pub prefix: String,

    /// This worker's IP, provided by the downward API; written back to the
    /// store so the pipeline controller can discover the worker
    pub worker_ip: String,

    /// Name of the pipeline this worker belongs to
    pub pipeline_name: String,

    /// Commit holding the pipeline spec this worker's image was built from
    pub spec_commit: String,

    /// Name of this pod
    pub pod_name: String,

    /// Namespace Sluice is deployed in
    pub namespace: String,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Required:
    /// - SLUICE_COORD_ADDR
    /// - SLUICE_PREFIX
    /// - SLUICE_WORKER_IP
    /// - SLUICE_PIPELINE_NAME
    /// - SLUICE_SPEC_COMMIT
    /// - SLUICE_POD_NAME
    /// - SLUICE_NAMESPACE
    ///
    /// Optional:
    /// - SLUICE_API_ADDR (default: "http://localhost:7650")
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            coord_addr: required("SLUICE_COORD_ADDR")?,
            api_addr: std::env::var("SLUICE_API_ADDR")
                .unwrap_or_else(|_| DEFAULT_API_ADDR.to_string()),
            prefix: required("SLUICE_PREFIX")?,
            worker_ip: required("SLUICE_WORKER_IP")?,
            pipeline_name: required("SLUICE_PIPELINE_NAME")?,
            spec_commit: required("SLUICE_SPEC_COMMIT")?,
            pod_name: required("SLUICE_POD_NAME")?,
            namespace: required("SLUICE_NAMESPACE")?,
        })
    }

    /// Validates that every required value is non-empty
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("coord_addr", &self.coord_addr),
            ("api_addr", &self.api_addr),
            ("prefix", &self.prefix),
            ("worker_ip", &self.worker_ip),
            ("pipeline_name", &self.pipeline_name),
            ("spec_commit", &self.spec_commit),
            ("pod_name", &self.pod_name),
            ("namespace", &self.namespace),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(WorkerError::Config(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| WorkerError::Config(format!("{name} environment variable not set")))
}

//! Coordination-store key layout
//!
//! All Sluice records live under a single configurable prefix:
//! - `{prefix}/pipelines/{name}` holds the pipeline record
//! - `{prefix}/workers/{rc_name}/{ip}` is a lease-bound worker marker whose
//!   existence advertises a reachable worker

/// Key holding the record for `pipeline`.
pub fn pipeline_key(prefix: &str, pipeline: &str) -> String {
    format!("{prefix}/pipelines/{pipeline}")
}

/// Key a worker publishes to advertise its address.
pub fn worker_key(prefix: &str, rc_name: &str, worker_ip: &str) -> String {
    format!("{prefix}/workers/{rc_name}/{worker_ip}")
}

/// Name of the replication controller managing the workers of a pipeline
/// version. Workers of different versions register under different names so
/// discovery never mixes versions during an update.
pub fn rc_name(pipeline: &str, version: u64) -> String {
    format!("pipeline-{pipeline}-v{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_key_layout() {
        assert_eq!(
            pipeline_key("/sluice/pps", "edges"),
            "/sluice/pps/pipelines/edges"
        );
    }

    #[test]
    fn test_worker_key_layout() {
        assert_eq!(
            worker_key("/sluice/pps", "pipeline-edges-v2", "10.0.0.7"),
            "/sluice/pps/workers/pipeline-edges-v2/10.0.0.7"
        );
    }

    #[test]
    fn test_rc_name_includes_version() {
        assert_eq!(rc_name("edges", 2), "pipeline-edges-v2");
    }
}

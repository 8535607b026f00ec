//! Sluice Worker
//!
//! Bootstrap of a worker process joining a pipeline:
//! - Configuration: required values from the pod environment, validated up
//!   front
//! - Metadata: the pipeline record from the coordination store, with the
//!   locally provisioned spec commit taking precedence over the stored one
//! - Service: the RPC surface, started on its own task behind a readiness
//!   gate
//! - Registration: a lease-bound discovery key published only after the
//!   service is ready, renewed for the life of the process
//!
//! Every failure is fatal. The worker exits non-zero and the supervisor
//! restarts it, re-running the whole sequence with a fresh lease.

mod api;
mod bootstrap;
mod config;
mod error;
mod metadata;
mod registrar;

use crate::api::WorkerState;
use crate::config::Config;
use crate::error::WorkerError;
use crate::metadata::MetadataFetcher;
use crate::registrar::DiscoveryRegistrar;
use sluice_client::{ApiClient, CoordStore, HttpCoordStore};
use sluice_core::keys;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sluice Worker");

    if let Err(e) = run().await {
        error!("Worker failed: {e:#}");
        return Err(e.into());
    }
    Ok(())
}

async fn run() -> Result<(), WorkerError> {
    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: pipeline={}, spec_commit={}, worker_ip={}",
        config.pipeline_name, config.spec_commit, config.worker_ip
    );

    let coord: Arc<dyn CoordStore> = Arc::new(HttpCoordStore::new(&config.coord_addr));
    let api_client = Arc::new(ApiClient::new(&config.api_addr));

    let fetcher = MetadataFetcher::new(Arc::clone(&coord), Arc::clone(&api_client), &config.prefix);
    let metadata = fetcher
        .fetch(&config.pipeline_name, &config.spec_commit)
        .await?;
    info!(
        "Fetched pipeline metadata: pipeline={}, version={}, spec_commit={}",
        metadata.pipeline, metadata.version, metadata.spec_commit
    );

    let rc_name = keys::rc_name(&metadata.pipeline, metadata.version);
    let router = api::router(WorkerState {
        metadata: Arc::new(metadata),
        api: api_client,
        pod_name: config.pod_name.clone(),
        namespace: config.namespace.clone(),
    });

    let (ready, serving) = bootstrap::start(router, api::WORKER_PORT);
    let registrar = DiscoveryRegistrar::new(Arc::clone(&coord));

    // Serving and registration run as one group: the first failure on either
    // side ends the process. After a successful registration only the
    // serving loop remains, and its termination is the process's result.
    let mut tasks: JoinSet<Result<(), WorkerError>> = JoinSet::new();

    tasks.spawn(async move {
        match serving.await {
            Ok(result) => result,
            Err(e) => Err(WorkerError::Service(format!("serving task panicked: {e}"))),
        }
    });

    let prefix = config.prefix.clone();
    let worker_ip = config.worker_ip.clone();
    tasks.spawn(async move {
        ready.wait().await?;
        let manager = registrar.register(&prefix, &rc_name, &worker_ip).await?;
        info!(
            "Registered for discovery: key={}, lease={}",
            manager.registration().key,
            manager.registration().lease
        );
        // The renewal task detaches here and runs until the process dies;
        // lease expiry is how peers observe our departure.
        drop(manager);
        Ok(())
    });

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => {
                tasks.abort_all();
                return Err(WorkerError::Service(format!("bootstrap task panicked: {e}")));
            }
        }
    }
    Ok(())
}

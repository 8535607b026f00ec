//! Service bootstrap
//!
//! Starts the worker's RPC service on its own task and hands the caller a
//! one-shot readiness gate. Readiness means the listener is bound and the
//! handlers are registered; the discovery registration must not run before
//! that, or the pipeline controller would route work at a worker that cannot
//! accept it yet.
//!
//! The gate carries a result, not a bare signal: if the serving task dies
//! before it would have become ready, the waiter resolves with that failure
//! instead of suspending forever.

use crate::error::WorkerError;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Single-fire readiness gate for the worker service
pub struct Ready {
    rx: oneshot::Receiver<Result<(), WorkerError>>,
}

impl Ready {
    /// Resolves when the service is ready, or with the setup failure if the
    /// serving task dies first. A dropped sender counts as a failure.
    pub async fn wait(self) -> Result<(), WorkerError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(WorkerError::Service(
                "service task exited before signalling readiness".to_string(),
            )),
        }
    }
}

pub(crate) fn ready_channel() -> (oneshot::Sender<Result<(), WorkerError>>, Ready) {
    let (tx, rx) = oneshot::channel();
    (tx, Ready { rx })
}

/// Starts the serving loop on a background task
///
/// Returns the readiness gate and the task handle. The task runs until the
/// process dies or serving fails; its result is the terminal result of the
/// whole worker.
pub fn start(router: Router, port: u16) -> (Ready, JoinHandle<Result<(), WorkerError>>) {
    let (tx, ready) = ready_channel();
    let handle = tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let message = format!("failed to bind {addr}: {e}");
                let _ = tx.send(Err(WorkerError::Service(message.clone())));
                return Err(WorkerError::Service(message));
            }
        };
        info!(%addr, "worker service listening");

        // Handlers were registered when the router was built; with the
        // listener bound the service can accept requests.
        let _ = tx.send(Ok(()));

        axum::serve(listener, router)
            .await
            .map_err(|e| WorkerError::Service(format!("serving loop failed: {e}")))
    });
    (ready, handle)
}

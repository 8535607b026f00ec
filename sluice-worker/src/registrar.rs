//! Discovery registration
//!
//! Once the worker service is ready, the registrar advertises the worker's
//! address in the coordination store: grant a lease, start renewing it, then
//! publish an empty marker key bound to it. The key's existence is the
//! discovery signal; if this process dies, renewal stops and the store drops
//! the key within the lease TTL.
//!
//! No step retries. A failure anywhere aborts the process and the supervisor
//! re-runs the whole sequence with a fresh lease.

use crate::error::{Result, WorkerError};
use sluice_client::{CoordStore, LeaseId, LeaseKeepAlive};
use sluice_core::keys;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// TTL of the discovery lease
pub const LEASE_TTL: Duration = Duration::from_secs(10);

/// Bound on each unary store operation during registration
pub const LEASE_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// A published worker registration
#[derive(Debug)]
pub struct WorkerRegistration {
    /// Marker key advertising this worker
    pub key: String,
    /// Lease the key is bound to
    pub lease: LeaseId,
}

/// Owns the background task renewing the discovery lease
///
/// The task runs for the rest of the process's life; nothing in production
/// stops it. [`stop`](Self::stop) exists so tests can observe lease expiry.
#[derive(Debug)]
pub struct LeaseManager {
    registration: WorkerRegistration,
    renewal: JoinHandle<()>,
}

impl LeaseManager {
    fn spawn(registration: WorkerRegistration, keeper: Box<dyn LeaseKeepAlive>) -> Self {
        let lease = keeper.lease();
        let renewal = tokio::spawn(async move {
            // Renewal only returns on failure. The lease then expires on its
            // own and peers observe this worker as gone.
            if let Err(e) = keeper.run().await {
                warn!(%lease, error = %e, "lease keepalive terminated");
            }
        });
        Self {
            registration,
            renewal,
        }
    }

    /// The registration this lease keeps alive
    pub fn registration(&self) -> &WorkerRegistration {
        &self.registration
    }

    /// Stops renewing the lease. Test-only; production ties the keepalive to
    /// process lifetime.
    #[allow(dead_code)]
    pub fn stop(self) {
        self.renewal.abort();
    }
}

/// Publishes the worker's address under a kept-alive lease
pub struct DiscoveryRegistrar {
    coord: Arc<dyn CoordStore>,
    lease_ttl: Duration,
}

impl DiscoveryRegistrar {
    /// Creates a registrar against `coord` with the standard lease TTL
    pub fn new(coord: Arc<dyn CoordStore>) -> Self {
        Self::with_lease_ttl(coord, LEASE_TTL)
    }

    /// Registrar with a custom lease TTL. Tests shorten it to observe
    /// expiry without waiting out the production TTL.
    pub fn with_lease_ttl(coord: Arc<dyn CoordStore>, lease_ttl: Duration) -> Self {
        Self { coord, lease_ttl }
    }

    /// Grants the lease, starts keepalive, and publishes the marker key
    ///
    /// Must only be called after the service readiness gate has fired.
    /// Ordering inside is fixed: keepalive starts before the publish, so a
    /// keepalive that cannot start never leaves an un-renewed lease holding a
    /// published key.
    pub async fn register(
        &self,
        prefix: &str,
        rc_name: &str,
        worker_ip: &str,
    ) -> Result<LeaseManager> {
        let key = keys::worker_key(prefix, rc_name, worker_ip);

        let lease = bounded("lease grant", self.coord.grant(self.lease_ttl)).await?;

        let keeper = self
            .coord
            .keep_alive(lease)
            .await
            .map_err(|source| WorkerError::Registration {
                op: "keepalive start",
                source,
            })?;

        bounded("registration publish", self.coord.put(&key, b"", Some(lease))).await?;

        Ok(LeaseManager::spawn(WorkerRegistration { key, lease }, keeper))
    }
}

async fn bounded<T, F>(op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sluice_client::CoordError>>,
{
    match tokio::time::timeout(LEASE_OP_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(WorkerError::Registration { op, source }),
        Err(_) => Err(WorkerError::DeadlineExceeded {
            op,
            secs: LEASE_OP_TIMEOUT.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;
    use sluice_client::MemCoordStore;
    use tokio::time::sleep;

    const PREFIX: &str = "/sluice/pps";
    const RC_NAME: &str = "pipeline-edges-v1";
    const IP: &str = "10.0.0.7";

    fn registrar(store: &MemCoordStore) -> DiscoveryRegistrar {
        DiscoveryRegistrar::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_register_publishes_lease_bound_key() {
        let store = MemCoordStore::new();
        let manager = registrar(&store).register(PREFIX, RC_NAME, IP).await.unwrap();

        let key = keys::worker_key(PREFIX, RC_NAME, IP);
        assert!(store.contains_key(&key));
        assert_eq!(store.lease_of(&key), Some(manager.registration().lease));
        assert!(store.lease_alive(manager.registration().lease));
        assert_eq!(manager.registration().key, key);
    }

    #[tokio::test]
    async fn test_stopping_renewal_expires_registration() {
        let store = MemCoordStore::new();
        let ttl = Duration::from_millis(100);
        let registrar =
            DiscoveryRegistrar::with_lease_ttl(Arc::new(store.clone()), ttl);
        let manager = registrar.register(PREFIX, RC_NAME, IP).await.unwrap();
        let key = keys::worker_key(PREFIX, RC_NAME, IP);

        // The lease manager's renewal task holds the key well past the TTL.
        sleep(ttl * 3).await;
        assert!(store.contains_key(&key));

        // Once renewal stops, the store reclaims the key on its own within
        // the TTL; the worker takes no further action.
        manager.stop();
        sleep(ttl * 3).await;
        assert!(!store.contains_key(&key));
    }

    #[tokio::test]
    async fn test_grant_failure_publishes_nothing() {
        let store = MemCoordStore::new();
        store.fail_grants(true);

        match registrar(&store).register(PREFIX, RC_NAME, IP).await {
            Err(WorkerError::Registration { op, .. }) => assert_eq!(op, "lease grant"),
            other => panic!("expected Registration error, got {other:?}"),
        }
        assert!(!store.contains_key(&keys::worker_key(PREFIX, RC_NAME, IP)));
    }

    #[tokio::test]
    async fn test_keepalive_start_failure_prevents_publish() {
        let store = MemCoordStore::new();
        store.fail_keepalives(true);

        match registrar(&store).register(PREFIX, RC_NAME, IP).await {
            Err(WorkerError::Registration { op, .. }) => assert_eq!(op, "keepalive start"),
            other => panic!("expected Registration error, got {other:?}"),
        }
        assert!(!store.contains_key(&keys::worker_key(PREFIX, RC_NAME, IP)));
    }

    #[tokio::test]
    async fn test_registration_waits_for_readiness() {
        let store = MemCoordStore::new();
        let registrar = registrar(&store);
        let (ready_tx, ready) = bootstrap::ready_channel();

        let registration = tokio::spawn(async move {
            ready.wait().await?;
            registrar.register(PREFIX, RC_NAME, IP).await
        });

        // Before the gate fires the store must not show this worker.
        sleep(Duration::from_millis(50)).await;
        let key = keys::worker_key(PREFIX, RC_NAME, IP);
        assert!(!store.contains_key(&key));

        ready_tx.send(Ok(())).unwrap();
        registration.await.unwrap().unwrap();
        assert!(store.contains_key(&key));
    }

    #[tokio::test]
    async fn test_setup_failure_aborts_registration() {
        let store = MemCoordStore::new();
        let registrar = registrar(&store);
        let (ready_tx, ready) = bootstrap::ready_channel();

        let registration = tokio::spawn(async move {
            ready.wait().await?;
            registrar.register(PREFIX, RC_NAME, IP).await
        });

        ready_tx
            .send(Err(WorkerError::Service("bind failed".to_string())))
            .unwrap();
        assert!(registration.await.unwrap().is_err());
        assert!(!store.contains_key(&keys::worker_key(PREFIX, RC_NAME, IP)));
    }
}

//! In-memory coordination store
//!
//! Implements [`CoordStore`] with real lease semantics: granted leases carry
//! an expiry deadline, keepalive streams push the deadline forward, and keys
//! bound to an expired lease disappear on the next access. Used by tests and
//! local single-process runs.
//!
//! Failure injection: [`fail_grants`](MemCoordStore::fail_grants) and
//! [`fail_keepalives`](MemCoordStore::fail_keepalives) make the corresponding
//! operations return [`CoordError::Unavailable`], for exercising fatal
//! bootstrap paths.

use crate::coord::{CoordStore, KvEntry, LeaseId, LeaseKeepAlive};
use crate::error::{CoordError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// In-memory [`CoordStore`] with lease expiry
#[derive(Debug, Clone, Default)]
pub struct MemCoordStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    kvs: HashMap<String, Entry>,
    leases: HashMap<i64, Lease>,
    next_lease_id: i64,
    fail_grants: bool,
    fail_keepalives: bool,
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    lease: Option<LeaseId>,
}

#[derive(Debug)]
struct Lease {
    ttl: Duration,
    expires_at: Instant,
}

impl Inner {
    /// Drops expired leases and every key bound to them.
    fn sweep(&mut self) {
        let now = Instant::now();
        let expired: Vec<i64> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.leases.remove(&id);
            self.kvs.retain(|_, entry| entry.lease != Some(LeaseId(id)));
        }
    }
}

impl MemCoordStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `grant` calls fail
    pub fn fail_grants(&self, fail: bool) {
        self.inner.lock().unwrap().fail_grants = fail;
    }

    /// Makes subsequent `keep_alive` calls fail
    pub fn fail_keepalives(&self, fail: bool) {
        self.inner.lock().unwrap().fail_keepalives = fail;
    }

    /// True if `key` currently exists (expiry applied first)
    pub fn contains_key(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        inner.kvs.contains_key(key)
    }

    /// Lease the entry at `key` is bound to, if the entry exists
    pub fn lease_of(&self, key: &str) -> Option<LeaseId> {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        inner.kvs.get(key).and_then(|entry| entry.lease)
    }

    /// True if `lease` has been granted and has not expired
    pub fn lease_alive(&self, lease: LeaseId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        inner.leases.contains_key(&lease.0)
    }

    fn renew(&self, lease: LeaseId) -> Result<Duration> {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        match inner.leases.get_mut(&lease.0) {
            Some(state) => {
                state.expires_at = Instant::now() + state.ttl;
                Ok(state.ttl)
            }
            None => Err(CoordError::LeaseExpired(lease)),
        }
    }
}

#[async_trait]
impl CoordStore for MemCoordStore {
    // Range-style read: returns every entry stored at or under `key`, in
    // key order.
    async fn get(&self, key: &str) -> Result<Vec<KvEntry>> {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        let mut entries: Vec<KvEntry> = inner
            .kvs
            .iter()
            .filter(|(k, _)| k.starts_with(key))
            .map(|(k, entry)| KvEntry {
                key: k.clone(),
                value: entry.value.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn grant(&self, ttl: Duration) -> Result<LeaseId> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_grants {
            return Err(CoordError::Unavailable("injected grant failure".into()));
        }
        inner.sweep();
        inner.next_lease_id += 1;
        let id = inner.next_lease_id;
        inner.leases.insert(
            id,
            Lease {
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(LeaseId(id))
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<Box<dyn LeaseKeepAlive>> {
        if self.inner.lock().unwrap().fail_keepalives {
            return Err(CoordError::Unavailable("injected keepalive failure".into()));
        }
        let ttl = self.renew(lease)?;
        Ok(Box::new(MemLeaseKeepAlive {
            store: self.clone(),
            lease,
            interval: ttl / 3,
        }))
    }

    async fn put(&self, key: &str, value: &[u8], lease: Option<LeaseId>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sweep();
        if let Some(lease) = lease {
            if !inner.leases.contains_key(&lease.0) {
                return Err(CoordError::LeaseExpired(lease));
            }
        }
        inner.kvs.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                lease,
            },
        );
        Ok(())
    }
}

#[derive(Debug)]
struct MemLeaseKeepAlive {
    store: MemCoordStore,
    lease: LeaseId,
    interval: Duration,
}

#[async_trait]
impl LeaseKeepAlive for MemLeaseKeepAlive {
    fn lease(&self) -> LeaseId {
        self.lease
    }

    async fn run(self: Box<Self>) -> Result<()> {
        loop {
            tokio::time::sleep(self.interval).await;
            self.store.renew(self.lease)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const SHORT_TTL: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_get_returns_stored_entry() {
        let store = MemCoordStore::new();
        store.put("/sluice/pipelines/edges", b"{}", None).await.unwrap();

        let entries = store.get("/sluice/pipelines/edges").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, b"{}");
    }

    #[tokio::test]
    async fn test_get_scans_by_prefix() {
        let store = MemCoordStore::new();
        store.put("/sluice/workers/rc/10.0.0.1", b"", None).await.unwrap();
        store.put("/sluice/workers/rc/10.0.0.2", b"", None).await.unwrap();

        let entries = store.get("/sluice/workers/rc").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "/sluice/workers/rc/10.0.0.1");
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_no_entries() {
        let store = MemCoordStore::new();
        assert!(store.get("/sluice/pipelines/nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lease_bound_key_expires_without_renewal() {
        let store = MemCoordStore::new();
        let lease = store.grant(SHORT_TTL).await.unwrap();
        store.put("/sluice/workers/w/ip", b"", Some(lease)).await.unwrap();
        assert!(store.contains_key("/sluice/workers/w/ip"));

        sleep(SHORT_TTL * 3).await;
        assert!(!store.contains_key("/sluice/workers/w/ip"));
        assert!(!store.lease_alive(lease));
    }

    #[tokio::test]
    async fn test_keepalive_holds_key_past_ttl() {
        let store = MemCoordStore::new();
        let lease = store.grant(SHORT_TTL).await.unwrap();
        let keeper = store.keep_alive(lease).await.unwrap();
        let renewal = tokio::spawn(keeper.run());
        store.put("/sluice/workers/w/ip", b"", Some(lease)).await.unwrap();

        sleep(SHORT_TTL * 3).await;
        assert!(store.contains_key("/sluice/workers/w/ip"));

        // Stop renewing; the store reclaims the key on its own.
        renewal.abort();
        sleep(SHORT_TTL * 3).await;
        assert!(!store.contains_key("/sluice/workers/w/ip"));
    }

    #[tokio::test]
    async fn test_keepalive_for_expired_lease_fails() {
        let store = MemCoordStore::new();
        let lease = store.grant(Duration::from_millis(10)).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        match store.keep_alive(lease).await {
            Err(CoordError::LeaseExpired(id)) => assert_eq!(id, lease),
            other => panic!("expected LeaseExpired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_with_dead_lease_fails() {
        let store = MemCoordStore::new();
        let lease = store.grant(Duration::from_millis(10)).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert!(store.put("/k", b"", Some(lease)).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_grant_failure() {
        let store = MemCoordStore::new();
        store.fail_grants(true);
        assert!(matches!(
            store.grant(SHORT_TTL).await,
            Err(CoordError::Unavailable(_))
        ));

        store.fail_grants(false);
        assert!(store.grant(SHORT_TTL).await.is_ok());
    }
}

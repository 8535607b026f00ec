//! Coordination-store abstraction
//!
//! The store is a replicated key-value service with lease-bound keys. Sluice
//! uses it for pipeline metadata distribution and worker discovery. The
//! [`CoordStore`] trait is the narrow surface this crate's consumers depend
//! on; implementations live in [`crate::http`] and [`crate::mem`].

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Identifier of a lease granted by the coordination store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(pub i64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A key-value entry returned by a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Coordination-store operations Sluice consumes
#[async_trait]
pub trait CoordStore: Send + Sync {
    /// Reads all entries stored at or under `key` (zero, one, or more).
    /// This is a prefix range in every implementation, so callers expecting
    /// a single record must check the count themselves.
    async fn get(&self, key: &str) -> Result<Vec<KvEntry>>;

    /// Grants a lease. Keys bound to it are deleted by the store if the
    /// lease is not renewed within `ttl`.
    async fn grant(&self, ttl: Duration) -> Result<LeaseId>;

    /// Opens a renewal stream for `lease`. The call itself performs the
    /// first renewal, so a dead lease or unreachable store fails here rather
    /// than silently inside the background task.
    async fn keep_alive(&self, lease: LeaseId) -> Result<Box<dyn LeaseKeepAlive>>;

    /// Writes `value` at `key`, optionally bound to `lease`.
    async fn put(&self, key: &str, value: &[u8], lease: Option<LeaseId>) -> Result<()>;
}

/// A running lease-renewal stream
///
/// [`run`](Self::run) renews the lease indefinitely. It returns only when a
/// renewal fails, which the store treats as the holder's departure: every key
/// bound to the lease disappears within its TTL.
#[async_trait]
pub trait LeaseKeepAlive: Send + std::fmt::Debug {
    /// The lease this stream renews.
    fn lease(&self) -> LeaseId;

    /// Drives renewals until one fails.
    async fn run(self: Box<Self>) -> Result<()>;
}

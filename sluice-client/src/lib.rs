//! Sluice Clients
//!
//! Client-side plumbing shared by Sluice components:
//! - [`coord`]: the coordination-store abstraction (KV reads/writes, leases,
//!   keepalive streams)
//! - [`http`]: coordination-store implementation speaking the store's v3 JSON
//!   gateway
//! - [`mem`]: in-memory coordination store with real lease expiry, for tests
//!   and local development
//! - [`api`]: authenticated client for the pipeline API

pub mod api;
pub mod coord;
pub mod error;
pub mod http;
pub mod mem;

pub use api::ApiClient;
pub use coord::{CoordStore, KvEntry, LeaseId, LeaseKeepAlive};
pub use error::CoordError;
pub use http::HttpCoordStore;
pub use mem::MemCoordStore;

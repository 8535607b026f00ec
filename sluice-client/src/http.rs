//! HTTP coordination-store client
//!
//! Speaks the store's v3 JSON gateway: unary POST endpoints with
//! base64-encoded keys and values, and 64-bit integers carried as decimal
//! strings. Renewal uses the unary keepalive endpoint on a fixed fraction of
//! the lease TTL rather than holding a streaming body open.

use crate::coord::{CoordStore, KvEntry, LeaseId, LeaseKeepAlive};
use crate::error::{CoordError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Coordination-store client over the v3 JSON gateway
#[derive(Debug, Clone)]
pub struct HttpCoordStore {
    base_url: String,
    client: Client,
}

impl HttpCoordStore {
    /// Create a new store client
    ///
    /// # Arguments
    /// * `base_url` - Gateway base URL (e.g., "http://etcd:2379")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new store client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the gateway base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(CoordError::api_error(status.as_u16(), message));
        }

        Ok(response.json().await?)
    }

    async fn renew(&self, lease: LeaseId) -> Result<Duration> {
        let request = wire::KeepAliveRequest {
            id: lease.0.to_string(),
        };
        let response: wire::KeepAliveResponse = self.post("/v3/lease/keepalive", &request).await?;

        // A renewal for an expired lease succeeds at the HTTP level but comes
        // back without a TTL.
        let ttl = response
            .result
            .and_then(|r| r.ttl)
            .ok_or(CoordError::LeaseExpired(lease))?;
        let secs = parse_i64("keepalive TTL", &ttl)?;
        Ok(Duration::from_secs(secs.max(1) as u64))
    }
}

#[async_trait]
impl CoordStore for HttpCoordStore {
    // Range read over [key, prefix_range_end(key)), so entries stored under
    // the key are all returned, matching the trait's 0..N contract.
    async fn get(&self, key: &str) -> Result<Vec<KvEntry>> {
        let request = wire::RangeRequest {
            key: BASE64.encode(key),
            range_end: BASE64.encode(prefix_range_end(key)),
        };
        let response: wire::RangeResponse = self.post("/v3/kv/range", &request).await?;

        response
            .kvs
            .into_iter()
            .map(|kv| {
                let key = BASE64
                    .decode(&kv.key)
                    .map_err(|e| CoordError::DecodeError(format!("bad key encoding: {e}")))?;
                let value = match kv.value {
                    Some(v) => BASE64
                        .decode(&v)
                        .map_err(|e| CoordError::DecodeError(format!("bad value encoding: {e}")))?,
                    None => Vec::new(),
                };
                Ok(KvEntry {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    value,
                })
            })
            .collect()
    }

    async fn grant(&self, ttl: Duration) -> Result<LeaseId> {
        let request = wire::GrantRequest {
            ttl: ttl.as_secs().to_string(),
            id: "0".to_string(),
        };
        let response: wire::GrantResponse = self.post("/v3/lease/grant", &request).await?;
        let id = parse_i64("lease ID", &response.id)?;
        debug!(lease = id, "lease granted");
        Ok(LeaseId(id))
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<Box<dyn LeaseKeepAlive>> {
        // First renewal happens here so the caller observes a dead lease or
        // an unreachable gateway immediately.
        let ttl = self.renew(lease).await?;
        Ok(Box::new(HttpLeaseKeepAlive {
            store: self.clone(),
            lease,
            interval: ttl / 3,
        }))
    }

    async fn put(&self, key: &str, value: &[u8], lease: Option<LeaseId>) -> Result<()> {
        let request = wire::PutRequest {
            key: BASE64.encode(key),
            value: BASE64.encode(value),
            lease: lease.map(|l| l.0.to_string()),
        };
        let _: wire::PutResponse = self.post("/v3/kv/put", &request).await?;
        Ok(())
    }
}

/// Renewal stream over the unary keepalive endpoint
#[derive(Debug)]
struct HttpLeaseKeepAlive {
    store: HttpCoordStore,
    lease: LeaseId,
    interval: Duration,
}

#[async_trait]
impl LeaseKeepAlive for HttpLeaseKeepAlive {
    fn lease(&self) -> LeaseId {
        self.lease
    }

    async fn run(self: Box<Self>) -> Result<()> {
        loop {
            tokio::time::sleep(self.interval).await;
            self.store.renew(self.lease).await?;
            debug!(lease = %self.lease, "lease renewed");
        }
    }
}

fn parse_i64(what: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| CoordError::DecodeError(format!("{what} is not an integer: {raw:?}")))
}

/// First key past every key prefixed by `key`: the prefix with its last
/// non-0xff byte incremented. All-0xff prefixes range to the end of the key
/// space, which the gateway spells as a single zero byte.
fn prefix_range_end(key: &str) -> Vec<u8> {
    let mut end = key.as_bytes().to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xff {
            *last += 1;
            return end;
        }
        end.pop();
    }
    vec![0]
}

/// Gateway wire format
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    pub struct RangeRequest {
        pub key: String,
        pub range_end: String,
    }

    #[derive(Deserialize)]
    pub struct RangeResponse {
        #[serde(default)]
        pub kvs: Vec<KeyValue>,
    }

    #[derive(Deserialize)]
    pub struct KeyValue {
        pub key: String,
        pub value: Option<String>,
    }

    #[derive(Serialize)]
    pub struct GrantRequest {
        #[serde(rename = "TTL")]
        pub ttl: String,
        #[serde(rename = "ID")]
        pub id: String,
    }

    #[derive(Deserialize)]
    pub struct GrantResponse {
        #[serde(rename = "ID")]
        pub id: String,
    }

    #[derive(Serialize)]
    pub struct PutRequest {
        pub key: String,
        pub value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub lease: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct PutResponse {}

    #[derive(Serialize)]
    pub struct KeepAliveRequest {
        #[serde(rename = "ID")]
        pub id: String,
    }

    #[derive(Deserialize)]
    pub struct KeepAliveResponse {
        pub result: Option<KeepAliveResult>,
    }

    #[derive(Deserialize)]
    pub struct KeepAliveResult {
        #[serde(rename = "TTL")]
        pub ttl: Option<String>,
    }
}

//! Pipeline-API client
//!
//! Thin authenticated HTTP client for the pipeline API (usually the sidecar
//! next to the worker). The client starts unauthenticated; the bootstrap
//! attaches the pipeline's token once the pipeline record has been fetched,
//! and every later protected call carries it.

use reqwest::{Client, Method, RequestBuilder};
use std::sync::RwLock;

/// Authenticated client for the pipeline API
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    auth_token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a new pipeline-API client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the pipeline API (e.g., "http://localhost:7650")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth_token: RwLock::new(None),
        }
    }

    /// Get the base URL of the pipeline API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach the pipeline's auth token. Calls built after this carry it.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        *self.auth_token.write().unwrap() = Some(token.into());
    }

    /// Currently attached auth token, if any
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.read().unwrap().clone()
    }

    /// Builds a request against the pipeline API, with the auth token if one
    /// has been attached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.auth_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

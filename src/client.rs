//! Shared authenticated HTTP client for directory and node requests.

use std::time::Duration;

use reqwest::RequestBuilder;

use crate::error::{Error, Result};

/// Configuration for the fleet HTTP client.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Bearer token attached to every authenticated request.
    pub api_token: String,

    /// Per-request timeout, enforced by the transport. Covers the whole
    /// request including a streamed index body.
    pub request_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Authenticated HTTP client shared read-only by all concurrent tasks.
///
/// Cloning is cheap; every clone reuses the same connection pool.
#[derive(Debug, Clone)]
pub struct FleetClient {
    http: reqwest::Client,
    token: String,
}

impl FleetClient {
    pub fn new(config: FleetConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(Error::Client)?;
        Ok(Self {
            http,
            token: config.api_token,
        })
    }

    /// Plain GET, used for status probes.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    /// GET with the bearer token attached.
    pub(crate) fn authed_get(&self, url: &str) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.token)
    }

    /// PUT with the bearer token attached.
    pub(crate) fn authed_put(&self, url: &str) -> RequestBuilder {
        self.http.put(url).bearer_auth(&self.token)
    }
}

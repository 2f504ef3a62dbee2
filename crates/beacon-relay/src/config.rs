//! Relay client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default client-server API prefix
pub const DEFAULT_API_BASE: &str = "/_matrix/client/r0";

/// Relay client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay node URL, e.g. `https://beacon-node-1.sky.papers.tech`
    pub homeserver_url: String,
    /// Client-server API path prefix
    pub api_base: String,
    /// Consecutive sync failures tolerated before polling halts
    pub max_sync_retries: u32,
    /// Long-poll timeout sent with every sync after the first success
    pub polling_timeout_ms: u64,
    /// Pause between successful syncs
    pub poll_interval_ms: u64,
    /// Pause before retrying a failed sync
    pub retry_delay_ms: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            homeserver_url: "https://beacon-node-1.sky.papers.tech".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            max_sync_retries: 3,
            polling_timeout_ms: 3000,
            poll_interval_ms: 0,
            retry_delay_ms: 0,
            request_timeout_secs: 60,
        }
    }
}

impl RelayConfig {
    /// Create a config for a relay node
    pub fn new(homeserver_url: impl Into<String>) -> Self {
        Self::default().with_homeserver_url(homeserver_url)
    }

    pub fn with_homeserver_url(mut self, url: impl Into<String>) -> Self {
        self.homeserver_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the consecutive sync failure limit
    pub fn with_max_sync_retries(mut self, retries: u32) -> Self {
        self.max_sync_retries = retries;
        self
    }

    pub fn with_polling_timeout(mut self, millis: u64) -> Self {
        self.polling_timeout_ms = millis;
        self
    }

    pub fn with_poll_interval(mut self, millis: u64) -> Self {
        self.poll_interval_ms = millis;
        self
    }

    pub fn with_retry_delay(mut self, millis: u64) -> Self {
        self.retry_delay_ms = millis;
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Full URL of an API endpoint, `path` starting with `/`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.homeserver_url, self.api_base, path)
    }

    /// Relay host name, used as the relay part of peer identifiers
    pub fn relay_host(&self) -> &str {
        let without_scheme = self
            .homeserver_url
            .split_once("://")
            .map_or(self.homeserver_url.as_str(), |(_, rest)| rest);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

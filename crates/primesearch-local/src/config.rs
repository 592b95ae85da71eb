use crate::pool::CachePolicy;
use primesearch_core::{DEFAULT_ENDPOINT, DEFAULT_TOOL_NAME};
use std::collections::BTreeMap;

pub const API_KEY_ENV: &str = "BIGMODEL_API_KEY";
pub const ENDPOINT_ENV: &str = "PRIMESEARCH_ENDPOINT";

pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn endpoint_from_env() -> Option<String> {
    std::env::var(ENDPOINT_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Everything a [`crate::client::SearchClient`] needs. The client itself never reads the
/// environment; build this with [`ClientConfig::from_env`] at the process boundary.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Headers sent on every session; per-call headers are layered on top.
    pub transport_headers: BTreeMap<String, String>,
    pub tool_name: String,
    pub cache_policy: CachePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            transport_headers: BTreeMap::new(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            cache_policy: CachePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: api_key_from_env(),
            endpoint: endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }
}

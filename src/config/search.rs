//! Web search provider configuration module.

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Custom Search JSON API endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Search provider configuration.
///
/// Credentials are process-level defaults; a `tools/call` request may carry
/// its own pair in headers, which wins for that call only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search API endpoint
    pub endpoint: String,

    /// API key
    pub api_key: Option<String>,

    /// Programmable search engine id
    pub engine_id: Option<String>,

    /// Timeout for one search call in milliseconds
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            api_key: None,
            engine_id: None,
            timeout_ms: 10_000,
        }
    }
}

impl SearchConfig {
    /// Search call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Validate for SearchConfig {
    fn validate(&self) -> ConfigResult<()> {
        url::Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::ValidationError(format!("search endpoint is not a valid URL: {e}"))
        })?;

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

//! Outbound HTTP configuration module.
//!
//! Settings shared by the page fetchers: client identity, timeouts, redirect
//! policy, and the optional headless rendering service.

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every outbound request
    pub user_agent: String,

    /// TCP/TLS connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-page fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,

    /// Maximum number of redirects followed for one page
    pub max_redirects: usize,

    /// Pages larger than this are truncated before text extraction
    pub max_page_bytes: usize,

    /// Rendering service endpoint used by the rendered fetch strategy
    pub render_endpoint: Option<String>,

    /// Bearer token for the rendering service
    pub render_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "Mozilla/5.0 (compatible; Nalu-MCP/{})",
                env!("CARGO_PKG_VERSION")
            ),
            connect_timeout_ms: 5_000,
            fetch_timeout_ms: 10_000,
            max_redirects: 10,
            max_page_bytes: 5 * 1024 * 1024, // 5 MiB
            render_endpoint: None,
            render_token: None,
        }
    }
}

impl HttpConfig {
    /// Per-page fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Validate for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "user_agent cannot be empty".to_string(),
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_page_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_page_bytes must be greater than 0".to_string(),
            ));
        }

        if let Some(endpoint) = &self.render_endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                ConfigError::ValidationError(format!("render_endpoint is not a valid URL: {e}"))
            })?;
        }

        Ok(())
    }
}

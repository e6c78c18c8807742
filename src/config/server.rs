//! Server configuration module.
//!
//! Settings for the HTTP endpoint itself: bind address, worker threads,
//! request budget, and the protocol versions offered during `initialize`.

use super::ConfigResult;
use super::Validate;
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Protocol revisions this server can speak, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name of the server, reported in `serverInfo` and `/health`
    pub name: String,

    /// Address the HTTP listener binds to
    pub address: SocketAddr,

    /// Number of runtime worker threads
    pub worker_threads: usize,

    /// Upper bound for a single engine invocation in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum accepted request body in bytes
    pub max_message_size: usize,

    /// Accepted protocol versions, newest first
    pub protocol_versions: Vec<String>,

    /// Optional usage notes returned in the `initialize` result
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "nalu-mcp".to_string(),
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            worker_threads: num_cpus::get(),
            request_timeout_ms: 60_000,
            max_message_size: 1024 * 1024, // 1 MiB
            protocol_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(|v| (*v).to_string())
                .collect(),
            instructions: Some(
                "Use the search tool to query the web and read the matching pages.".to_string(),
            ),
        }
    }
}

impl ServerConfig {
    /// The version chosen when a client does not request one.
    pub fn latest_protocol_version(&self) -> Option<&str> {
        self.protocol_versions.first().map(String::as_str)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Server name cannot be empty".to_string(),
            ));
        }

        if self.worker_threads == 0 {
            return Err(ConfigError::ValidationError(
                "worker_threads must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_size must be greater than 0".to_string(),
            ));
        }

        if self.protocol_versions.is_empty() {
            return Err(ConfigError::ValidationError(
                "protocol_versions must list at least one version".to_string(),
            ));
        }

        Ok(())
    }
}

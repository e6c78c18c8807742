//! Session store configuration module.

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default name of the durable session table.
pub const DEFAULT_TABLE_NAME: &str = "mcp_sessions";

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds, refreshed on every call
    pub ttl_secs: u64,

    /// SQLite database file for the durable tier; memory only when unset
    pub durable_path: Option<PathBuf>,

    /// Table holding session records
    pub table_name: String,

    /// Create the table when it does not exist
    pub auto_create_schema: bool,

    /// Budget for one durable-tier operation in milliseconds
    pub durable_timeout_ms: u64,

    /// Seconds between sweeps removing expired sessions from both tiers
    pub sweep_interval_secs: u64,
}


impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            durable_path: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            auto_create_schema: true,
            durable_timeout_ms: 2_000,
            sweep_interval_secs: 300,
        }
    }
}

impl SessionConfig {
    /// Session time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Durable-tier operation timeout.
    pub fn durable_timeout(&self) -> Duration {
        Duration::from_millis(self.durable_timeout_ms)
    }

    /// Interval of the expired-session sweep.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ttl_secs must be greater than 0".to_string(),
            ));
        }

        if self.durable_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "durable_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }

        // The name is interpolated into SQL, so only plain identifiers pass.
        let valid_identifier = !self.table_name.is_empty()
            && self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.table_name.starts_with(|c: char| c.is_ascii_digit());
        if !valid_identifier {
            return Err(ConfigError::ValidationError(format!(
                "table_name must be a plain identifier, got {:?}",
                self.table_name
            )));
        }

        Ok(())
    }
}

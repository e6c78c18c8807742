//! Configuration module for the Nalu MCP Server.
//!
//! Settings are layered: compiled defaults, then an optional file (TOML,
//! YAML, JSON), then environment variables prefixed with `NALU` using `__`
//! as the section separator (`NALU__SEARCH__API_KEY`). All values are
//! validated before use.

use crate::error::config::ConfigError;
use config::{Config, ConfigError as ExternalConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod http;
pub mod retrieval;
pub mod search;
pub mod server;
pub mod session;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "NALU";

/// Environment variables understood by earlier deployments of the server.
const LEGACY_API_KEY_VAR: &str = "GOOGLE_API_KEY";
const LEGACY_ENGINE_ID_VAR: &str = "GOOGLE_SEARCH_ENGINE_ID";
const LEGACY_SESSION_TABLE_VAR: &str = "MCP_SESSION_TABLE";

/// A trait for types that can be validated.
pub trait Validate {
    /// Validates that the configuration is correct.
    fn validate(&self) -> ConfigResult<()>;
}

/// Main configuration for the Nalu MCP Server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NaluConfig {
    /// Server configuration
    pub server: server::ServerConfig,

    /// Outbound HTTP configuration (page fetch, rendering service)
    pub http: http::HttpConfig,

    /// Session store configuration
    pub session: session::SessionConfig,

    /// Web search provider configuration
    pub search: search::SearchConfig,

    /// Retrieval pipeline configuration
    pub retrieval: retrieval::RetrievalConfig,

    /// Log configuration
    pub log: LogConfig,
}

impl Validate for NaluConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.http.validate()?;
        self.session.validate()?;
        self.search.validate()?;
        self.retrieval.validate()?;
        self.log.validate()?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to log in JSON format
    pub json: bool,

    /// Whether to include source code locations in logs
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            source_location: true,
        }
    }
}

impl Validate for LogConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}",
                self.level
            ))),
        }
    }
}

/// Configuration loader for the Nalu MCP Server.
#[derive(Debug)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Optional path to the configuration file
    /// * `env_prefix` - Prefix for environment variables that override configuration values
    pub fn new<P: AsRef<Path>>(config_path: Option<P>, env_prefix: &str) -> Self {
        Self {
            config_path: config_path.map(|p| p.as_ref().to_path_buf()),
            env_prefix: env_prefix.to_string(),
        }
    }

    /// Loads the configuration from defaults, file and environment variables.
    pub fn load(&self) -> ConfigResult<NaluConfig> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&NaluConfig::default())
                .map_err(|e| ConfigError::ParseError(e.to_string()))?,
        );

        if let Some(path) = &self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            let name = path
                .to_str()
                .ok_or_else(|| ConfigError::ParseError(format!("Non UTF-8 path: {path:?}")))?;

            builder = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => builder.add_source(File::with_name(name)),
                Some("json") => {
                    builder.add_source(File::with_name(name).format(config::FileFormat::Json))
                }
                Some("yaml" | "yml") => {
                    builder.add_source(File::with_name(name).format(config::FileFormat::Yaml))
                }
                _ => {
                    return Err(ConfigError::ParseError(format!(
                        "Unsupported file extension for: {path:?}"
                    )))
                }
            };
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(map_external_error)?;

        let mut nalu_config: NaluConfig = config
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        apply_legacy_env(&mut nalu_config, |key| std::env::var(key).ok());
        nalu_config.validate()?;

        Ok(nalu_config)
    }
}

fn map_external_error(err: ExternalConfigError) -> ConfigError {
    match err {
        ExternalConfigError::NotFound(path) => ConfigError::FileNotFound(PathBuf::from(path)),
        ExternalConfigError::PathParse(path) => {
            ConfigError::ParseError(format!("Invalid path: {path:?}"))
        }
        ExternalConfigError::FileParse { uri, cause } => ConfigError::FileReadError(format!(
            "{}: {cause}",
            uri.unwrap_or_else(|| "<unknown>".to_string())
        )),
        ExternalConfigError::Foreign(err) => ConfigError::ParseError(err.to_string()),
        ExternalConfigError::Frozen => {
            ConfigError::ParseError("Configuration is frozen".to_string())
        }
        ExternalConfigError::Message(msg) => ConfigError::ParseError(msg),
        ExternalConfigError::Type { key, .. } => ConfigError::ParseError(format!(
            "Type conversion error for {}",
            key.unwrap_or_else(|| "<unknown>".to_string())
        )),
    }
}

/// Fills unset values from the variable names used by older deployments.
///
/// `NALU__*` variables always win; legacy names only fill gaps.
pub fn apply_legacy_env<F>(config: &mut NaluConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if config.search.api_key.is_none() {
        config.search.api_key = non_empty(LEGACY_API_KEY_VAR);
    }
    if config.search.engine_id.is_none() {
        config.search.engine_id = non_empty(LEGACY_ENGINE_ID_VAR);
    }
    if config.session.table_name == session::DEFAULT_TABLE_NAME {
        if let Some(table) = non_empty(LEGACY_SESSION_TABLE_VAR) {
            config.session.table_name = table;
        }
    }
}

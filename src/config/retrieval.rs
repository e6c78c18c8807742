//! Retrieval pipeline configuration module.

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retrieval pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Overall deadline for the fetch stage in milliseconds
    pub pipeline_deadline_ms: u64,

    /// Scraped content longer than this is truncated in tool output
    pub max_content_chars: usize,

    /// Number of ranked chunks returned when chunk ranking is requested
    pub top_k_chunks: usize,

    /// Embedding backend used for semantic chunk scoring
    pub embedding: EmbeddingConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            pipeline_deadline_ms: 25_000,
            max_content_chars: 2_000,
            top_k_chunks: 5,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Fetch-stage deadline.
    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_millis(self.pipeline_deadline_ms)
    }
}

impl Validate for RetrievalConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.pipeline_deadline_ms == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline_deadline_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_content_chars == 0 {
            return Err(ConfigError::ValidationError(
                "max_content_chars must be greater than 0".to_string(),
            ));
        }

        if self.top_k_chunks == 0 {
            return Err(ConfigError::ValidationError(
                "top_k_chunks must be greater than 0".to_string(),
            ));
        }

        self.embedding.validate()
    }
}

/// OpenAI-compatible embedding endpoint.
///
/// Semantic scoring is available exactly when `endpoint` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embeddings endpoint, e.g. `https://api.openai.com/v1/embeddings`
    pub endpoint: Option<String>,

    /// Bearer token for the endpoint
    pub api_key: Option<String>,

    /// Embedding model name
    pub model: String,

    /// Timeout for one embedding call in milliseconds
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl EmbeddingConfig {
    /// Embedding call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Validate for EmbeddingConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                ConfigError::ValidationError(format!("embedding endpoint is not a valid URL: {e}"))
            })?;
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "embedding timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

//! Test utilities and fixtures for the Nalu MCP Server.
//!
//! Canned search providers and page fetchers, an engine factory and a
//! temporary-directory fixture shared by the cross-module tests.

use async_trait::async_trait;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::server::ServerConfig;
use crate::error::http::HttpError;
use crate::protocol::jsonrpc::create_handler;
use crate::protocol::{EngineRequest, EngineResponse, ProtocolEngine};
use crate::retrieval::fetch::{PageFetcher, ScrapingMethod};
use crate::retrieval::search::{SearchCredentials, SearchHit, SearchProvider};
use crate::retrieval::{PipelineSettings, RetrievalPipeline};
use crate::session::SessionStore;
use crate::tools::{CredentialOverrides, ToolRegistry};

/// Body of an `initialize` request for the newest protocol version.
pub const INITIALIZE_BODY: &str = r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"test-client","version":"1.0"}}}"#;

/// Temporary directory that lives as long as the fixture.
pub struct TestFixture {
    /// Temporary directory for test files
    pub temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new test fixture.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            temp_dir: tempfile::tempdir()?,
        })
    }

    /// Path of `name` inside the fixture directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

/// Search provider returning a fixed list of URLs.
#[derive(Debug, Clone)]
pub struct StubSearch {
    urls: Vec<String>,
}

impl StubSearch {
    /// Hits for `urls`, titled "Page N".
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(
        &self,
        _query: &str,
        count: usize,
        _credentials: &SearchCredentials,
    ) -> Result<Vec<SearchHit>, HttpError> {
        Ok(self
            .urls
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, url)| SearchHit {
                url: url.clone(),
                title: format!("Page {}", i + 1),
                snippet: format!("snippet {}", i + 1),
            })
            .collect())
    }
}

/// Page fetcher serving text from a map; unknown URLs fail.
#[derive(Debug, Clone, Default)]
pub struct StubPages {
    pages: HashMap<String, String>,
}

impl StubPages {
    /// Adds a page.
    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StubPages {
    fn method(&self) -> ScrapingMethod {
        ScrapingMethod::Static
    }

    async fn fetch(&self, url: &str) -> Result<String, HttpError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::HttpStatus {
                status: 404,
                message: "not found".to_string(),
            })
    }
}

/// Short budgets so failing tests fail fast.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        search_timeout: Duration::from_secs(2),
        fetch_timeout: Duration::from_secs(2),
        deadline: Duration::from_secs(5),
        top_k_chunks: 3,
    }
}

/// A pipeline over the stubs.
pub fn stub_pipeline(search: StubSearch, pages: StubPages) -> RetrievalPipeline {
    RetrievalPipeline::new(Arc::new(search), Arc::new(pages), fast_settings())
}

/// An engine over `registry` and `sessions` with the default server config.
pub fn engine_with(registry: ToolRegistry, sessions: SessionStore) -> ProtocolEngine {
    ProtocolEngine::new(
        create_handler(Arc::new(registry)),
        Arc::new(sessions),
        &ServerConfig::default(),
    )
}

/// Posts `body` with an optional session header.
pub async fn post(engine: &ProtocolEngine, session: Option<&str>, body: &str) -> EngineResponse {
    engine
        .handle(EngineRequest {
            session_id: session.map(str::to_string),
            overrides: CredentialOverrides::default(),
            body: body.as_bytes().to_vec(),
        })
        .await
}

/// Runs `initialize` and returns the issued session id.
pub async fn initialize(engine: &ProtocolEngine) -> String {
    post(engine, None, INITIALIZE_BODY)
        .await
        .session_id
        .unwrap_or_default()
}

/// The JSON body of a reply, or null for notifications.
pub fn body_json(reply: &EngineResponse) -> Value {
    reply
        .body
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok())
        .unwrap_or(Value::Null)
}

/// Strategy for printable words used as queries and page text.
pub fn word_strategy() -> BoxedStrategy<String> {
    "[a-z]{1,12}".boxed()
}

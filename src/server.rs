// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Composition root.
//!
//! Builds the session store, the retrieval pipeline, the tool registry and
//! the protocol engine from a [`NaluConfig`] and wires them into the HTTP
//! router.

use std::sync::Arc;

use axum::Router;
use tracing::{info, warn};

use crate::config::NaluConfig;
use crate::error::{NaluError, NaluResult};
use crate::protocol::jsonrpc::create_handler;
use crate::protocol::ProtocolEngine;
use crate::retrieval::RetrievalPipeline;
use crate::session::{now, SessionBackend, SessionStore, SqliteSessionBackend};
use crate::tools::{GetTimeTool, SearchTool, ToolRegistry};
use crate::transport::{self, AppState};

/// A fully wired server, ready to be served.
#[derive(Debug, Clone)]
pub struct NaluServer {
    config: NaluConfig,
    engine: ProtocolEngine,
    tools: Vec<String>,
}

impl NaluServer {
    /// Builds every component described by `config`.
    pub async fn build(config: NaluConfig) -> NaluResult<Self> {
        let sessions = Arc::new(build_session_store(&config).await);
        let pipeline = Arc::new(RetrievalPipeline::from_config(&config)?);
        let registry = build_registry(&config, pipeline)?;
        Ok(Self::assemble(config, registry, sessions))
    }

    /// Wires an already built registry and session store.
    pub fn assemble(
        config: NaluConfig,
        registry: ToolRegistry,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let tools = registry.names().iter().map(|n| n.to_string()).collect();
        let engine = ProtocolEngine::new(create_handler(Arc::new(registry)), sessions, &config.server);
        Self {
            config,
            engine,
            tools,
        }
    }

    /// Names of the registered tools.
    pub fn tool_names(&self) -> &[String] {
        &self.tools
    }

    /// The protocol engine.
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// The HTTP router for this server.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.engine.clone(), self.tools.clone(), &self.config.server);
        transport::router(state, self.config.server.max_message_size)
    }

    /// Serves on the configured address until Ctrl-C.
    pub async fn run(self) -> NaluResult<()> {
        let address = self.config.server.address;
        info!(
            name = %self.config.server.name,
            %address,
            tools = ?self.tools,
            durable_sessions = self.engine.sessions().has_durable_tier(),
            "Starting Nalu MCP Server"
        );
        let sweeper = self
            .engine
            .sessions()
            .spawn_sweeper(self.config.session.sweep_interval());
        let served = transport::serve(self.router(), address).await;
        sweeper.abort();
        served?;
        info!("Server stopped");
        Ok(())
    }
}

/// Registers the search and time tools.
pub fn build_registry(
    config: &NaluConfig,
    pipeline: Arc<RetrievalPipeline>,
) -> NaluResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let search = SearchTool::new(
        pipeline,
        config.search.clone(),
        config.retrieval.max_content_chars,
    );
    registry
        .register(search.descriptor())
        .map_err(|e| NaluError::Custom(e.to_string()))?;
    registry
        .register(GetTimeTool::descriptor())
        .map_err(|e| NaluError::Custom(e.to_string()))?;
    Ok(registry)
}

async fn build_session_store(config: &NaluConfig) -> SessionStore {
    let session = &config.session;
    let Some(path) = &session.durable_path else {
        return SessionStore::memory_only(session.ttl());
    };

    let backend = SqliteSessionBackend::new(
        path.clone(),
        session.table_name.clone(),
        session.auto_create_schema,
        session.durable_timeout(),
    );
    match backend.purge_expired(now()).await {
        Ok(purged) => info!(path = %path.display(), purged, "Durable session tier ready"),
        Err(e) => warn!(path = %path.display(), error = %e, "Durable session tier unavailable at startup"),
    }
    SessionStore::tiered(Arc::new(backend), session.ttl())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_build_default_server() {
        let server = NaluServer::build(NaluConfig::default()).await.unwrap();
        assert_eq!(server.tool_names(), ["search", "get_time"]);
        assert!(!server.engine().sessions().has_durable_tier());
    }

    #[tokio::test]
    async fn test_build_with_durable_tier() {
        let dir = tempdir().unwrap();
        let mut config = NaluConfig::default();
        config.session.durable_path = Some(dir.path().join("sessions.db"));

        let server = NaluServer::build(config).await.unwrap();
        assert!(server.engine().sessions().has_durable_tier());
    }
}

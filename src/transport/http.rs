// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Streamable HTTP transport.
//!
//! A thin axum layer over [`ProtocolEngine`]: it copies the relevant headers
//! into an [`EngineRequest`], bounds the engine call by the request timeout and
//! turns the [`EngineResponse`] back into an HTTP response.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::server::ServerConfig;
use crate::error::protocol::ProtocolError;
use crate::error::transport::TransportError;
use crate::error::{get_error_reporting, ErrorContext, NaluError};
use crate::protocol::jsonrpc::{parse_body, recover_id, Id, JsonRpcError, Response};
use crate::protocol::{
    CloseOutcome, EngineRequest, EngineResponse, ProtocolEngine, ReplyStatus,
    PROTOCOL_VERSION_HEADER, SESSION_HEADER,
};
use crate::tools::CredentialOverrides;

/// Path of the MCP endpoint.
pub const MCP_PATH: &str = "/mcp";

/// Path of the health probe.
pub const HEALTH_PATH: &str = "/health";

/// Per-call search API key.
pub const SEARCH_KEY_HEADER: &str = "x-search-api-key";

/// Per-call search engine id.
pub const SEARCH_ENGINE_HEADER: &str = "x-search-engine-id";

/// State shared by every route.
#[derive(Debug, Clone)]
pub struct AppState {
    engine: ProtocolEngine,
    server_name: String,
    tools: Vec<String>,
    request_timeout: Duration,
}

impl AppState {
    /// Creates the state for a router.
    pub fn new(engine: ProtocolEngine, tools: Vec<String>, config: &ServerConfig) -> Self {
        Self {
            engine,
            server_name: config.name.clone(),
            tools,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    /// The protocol engine behind the routes.
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }
}

/// Builds the router.
///
/// Bodies larger than `max_body` bytes are refused before they reach the
/// engine.
pub fn router(state: AppState, max_body: usize) -> Router {
    Router::new()
        .route(MCP_PATH, post(handle_post).delete(handle_delete))
        .route(HEALTH_PATH, get(handle_health))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

/// Binds `address` and serves until Ctrl-C.
pub async fn serve(router: Router, address: SocketAddr) -> Result<(), TransportError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| TransportError::Bind { address, source })?;
    serve_listener(listener, router, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    })
    .await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> Result<(), TransportError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(local) = listener.local_addr() {
        info!(address = %local, path = MCP_PATH, "Listening for MCP requests");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn handle_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> HttpResponse {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(status = %rejection.status(), "Request body rejected");
            let error = ProtocolError::InvalidMessage(rejection.body_text());
            return json_reply(
                StatusCode::BAD_REQUEST,
                HeaderMap::new(),
                Response::error(Id::Null, error.into()),
            );
        }
    };

    let request = EngineRequest {
        session_id: header(&headers, SESSION_HEADER),
        overrides: CredentialOverrides {
            search_api_key: header(&headers, SEARCH_KEY_HEADER),
            search_engine_id: header(&headers, SEARCH_ENGINE_HEADER),
        },
        body: body.to_vec(),
    };

    match tokio::time::timeout(state.request_timeout, state.engine.handle(request)).await {
        Ok(reply) => into_http(reply),
        Err(_) => {
            let millis = state.request_timeout.as_millis() as u64;
            get_error_reporting().report(
                ErrorContext::new(NaluError::Protocol(ProtocolError::Timeout(millis)), "transport")
                    .with_details(format!("POST {MCP_PATH}")),
            );
            let id = parse_body(&body)
                .map(|value| recover_id(&value))
                .unwrap_or(Id::Null);
            json_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                HeaderMap::new(),
                Response::error(id, JsonRpcError::from(ProtocolError::Timeout(millis))),
            )
        }
    }
}

async fn handle_delete(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    match state
        .engine
        .close_session(header(&headers, SESSION_HEADER).as_deref())
        .await
    {
        CloseOutcome::Closed => StatusCode::NO_CONTENT,
        CloseOutcome::MissingHeader => StatusCode::BAD_REQUEST,
        CloseOutcome::NotFound => StatusCode::NOT_FOUND,
    }
}

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "server": state.server_name,
        "version": crate::VERSION,
        "tools": state.tools,
    }))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn into_http(reply: EngineResponse) -> HttpResponse {
    let status = match reply.status {
        ReplyStatus::Ok => StatusCode::OK,
        ReplyStatus::Accepted => StatusCode::ACCEPTED,
        ReplyStatus::BadRequest => StatusCode::BAD_REQUEST,
        ReplyStatus::NotFound => StatusCode::NOT_FOUND,
        ReplyStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut headers = HeaderMap::new();
    set_header(&mut headers, SESSION_HEADER, reply.session_id.as_deref());
    set_header(&mut headers, PROTOCOL_VERSION_HEADER, reply.protocol_version.as_deref());

    match reply.body {
        Some(body) => json_reply(status, headers, body),
        None => (status, headers).into_response(),
    }
}

fn json_reply(status: StatusCode, headers: HeaderMap, body: Response) -> HttpResponse {
    (status, headers, Json(body)).into_response()
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => {
            let err = TransportError::InvalidHeader(name.to_string());
            warn!(error = %err, "Dropping response header");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::jsonrpc::create_handler;
    use crate::session::SessionStore;
    use crate::tools::{GetTimeTool, ToolRegistry};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with(config: ServerConfig) -> Router {
        let mut registry = ToolRegistry::new();
        registry.register(GetTimeTool::descriptor()).unwrap();
        let tools = registry.names().iter().map(|n| n.to_string()).collect();
        let engine = ProtocolEngine::new(
            create_handler(Arc::new(registry)),
            Arc::new(SessionStore::memory_only(Duration::from_secs(600))),
            &config,
        );
        let max_body = config.max_message_size;
        router(AppState::new(engine, tools, &config), max_body)
    }

    fn app() -> Router {
        app_with(ServerConfig::default())
    }

    fn post_mcp(session: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post(MCP_PATH).header("content-type", "application/json");
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn initialize(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_mcp(
                None,
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[PROTOCOL_VERSION_HEADER],
            "2025-03-26"
        );
        response.headers()[SESSION_HEADER]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tools"], json!(["get_time"]));
        assert_eq!(body["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn test_initialize_then_list() {
        let app = app();
        let session = initialize(&app).await;

        let response = app
            .clone()
            .oneshot(post_mcp(
                Some(&session),
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SESSION_HEADER], session.as_str());
        let body = body_json(response).await;
        assert_eq!(body["result"]["tools"][0]["name"], "get_time");
    }

    #[tokio::test]
    async fn test_missing_and_unknown_session() {
        let app = app();
        let missing = app
            .clone()
            .oneshot(post_mcp(None, r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(missing).await["error"]["code"], -32001);

        let unknown = app
            .oneshot(post_mcp(
                Some("does-not-exist"),
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/list"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(unknown).await["id"], 4);
    }

    #[tokio::test]
    async fn test_notification_is_accepted_without_body() {
        let app = app();
        let session = initialize(&app).await;
        let response = app
            .oneshot(post_mcp(
                Some(&session),
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_is_bad_request() {
        let response = app().oneshot(post_mcp(None, "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_oversized_body_is_bad_request() {
        let config = ServerConfig {
            max_message_size: 64,
            ..ServerConfig::default()
        };
        let padding = "x".repeat(256);
        let body = format!(r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"p":"{padding}"}}}}"#);
        let response = app_with(config).oneshot(post_mcp(None, &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let app = app();
        let session = initialize(&app).await;

        let delete = |session: Option<String>| {
            let mut builder = Request::delete(MCP_PATH);
            if let Some(session) = session {
                builder = builder.header(SESSION_HEADER, session);
            }
            builder.body(Body::empty()).unwrap()
        };

        let first = app.clone().oneshot(delete(Some(session.clone()))).await.unwrap();
        assert_eq!(first.status(), StatusCode::NO_CONTENT);
        let second = app.clone().oneshot(delete(Some(session.clone()))).await.unwrap();
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        let missing = app.clone().oneshot(delete(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let after = app
            .oneshot(post_mcp(
                Some(&session),
                r#"{"jsonrpc":"2.0","id":9,"method":"tools/list"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_header_trims_and_skips_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(SEARCH_KEY_HEADER, HeaderValue::from_static("  key  "));
        headers.insert(SEARCH_ENGINE_HEADER, HeaderValue::from_static(""));
        assert_eq!(header(&headers, SEARCH_KEY_HEADER).as_deref(), Some("key"));
        assert_eq!(header(&headers, SEARCH_ENGINE_HEADER), None);
        assert_eq!(header(&headers, SESSION_HEADER), None);
    }
}

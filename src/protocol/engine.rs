// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! MCP session state machine.
//!
//! The engine is transport-agnostic: it takes the body and the relevant
//! headers of one POST and returns the JSON-RPC response together with the
//! status class and the headers to send back. Sessions are resolved by id on
//! every call; nothing about a session is cached between requests.
//!
//! ```text
//! UNINITIALIZED --initialize--> INITIALIZED --DELETE / expiry--> CLOSED
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::jsonrpc::error::JsonRpcError;
use super::jsonrpc::handler::{JsonRpcHandler, MethodContext};
use super::jsonrpc::methods::{prepare_initialize, ServerIdentity};
use super::jsonrpc::types::{Id, Request, Response};
use super::jsonrpc::validation::{parse_body, recover_id, validate_value};
use crate::config::server::ServerConfig;
use crate::error::protocol::ProtocolError;
use crate::session::{Session, SessionStore};
use crate::tools::CredentialOverrides;

/// Header carrying the session id in both directions.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated protocol version.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// The parts of an HTTP request the engine looks at.
#[derive(Debug, Clone, Default)]
pub struct EngineRequest {
    /// Value of the `mcp-session-id` header
    pub session_id: Option<String>,
    /// Per-call credential headers
    pub overrides: CredentialOverrides,
    /// Raw request body
    pub body: Vec<u8>,
}

/// Status class of a reply, mapped to an HTTP status by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// A JSON-RPC response, successful or not
    Ok,
    /// A notification was accepted; there is no body
    Accepted,
    /// The body or the session header was unusable
    BadRequest,
    /// The named session does not exist or has expired
    NotFound,
    /// The server could not complete the request
    InternalError,
}

/// What to send back for one request.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    /// Status class
    pub status: ReplyStatus,
    /// Session id to echo in `mcp-session-id`
    pub session_id: Option<String>,
    /// Version to echo in `mcp-protocol-version`
    pub protocol_version: Option<String>,
    /// JSON-RPC response; absent for notifications
    pub body: Option<Response>,
}

impl EngineResponse {
    fn reply(status: ReplyStatus, response: Response) -> Self {
        Self {
            status,
            session_id: None,
            protocol_version: None,
            body: Some(response),
        }
    }

    fn for_session(mut self, session: &Session) -> Self {
        self.session_id = Some(session.id.clone());
        self.protocol_version = Some(session.protocol_version.clone());
        self
    }

    /// A notification acknowledgement.
    pub fn accepted() -> Self {
        Self {
            status: ReplyStatus::Accepted,
            session_id: None,
            protocol_version: None,
            body: None,
        }
    }
}

/// Outcome of closing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The session existed and is gone
    Closed,
    /// No session header was supplied
    MissingHeader,
    /// The session did not exist or had expired
    NotFound,
}

/// The MCP protocol engine.
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    handler: Arc<JsonRpcHandler>,
    sessions: Arc<SessionStore>,
    identity: ServerIdentity,
    protocol_versions: Vec<String>,
    max_message_size: usize,
}

impl ProtocolEngine {
    /// Creates an engine from its collaborators and the server configuration.
    pub fn new(
        handler: JsonRpcHandler,
        sessions: Arc<SessionStore>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            sessions,
            identity: ServerIdentity {
                name: config.name.clone(),
                version: crate::VERSION.to_string(),
                instructions: config.instructions.clone(),
            },
            protocol_versions: config.protocol_versions.clone(),
            max_message_size: config.max_message_size,
        }
    }

    /// The session store.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one POSTed message.
    pub async fn handle(&self, request: EngineRequest) -> EngineResponse {
        if request.body.len() > self.max_message_size {
            let err = ProtocolError::MessageTooLarge {
                size: request.body.len(),
                max_size: self.max_message_size,
            };
            return EngineResponse::reply(
                ReplyStatus::BadRequest,
                Response::error(Id::Null, err.into()),
            );
        }

        let value = match parse_body(&request.body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Unparseable request body");
                return EngineResponse::reply(
                    ReplyStatus::BadRequest,
                    Response::error(Id::Null, e.to_jsonrpc_error()),
                );
            }
        };
        let id = recover_id(&value);
        let message = match validate_value(value) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Invalid JSON-RPC envelope");
                return EngineResponse::reply(
                    ReplyStatus::BadRequest,
                    Response::error(id, e.to_jsonrpc_error()),
                );
            }
        };

        let session_id = request.session_id.as_deref().filter(|s| !s.is_empty());

        if message.is_notification() {
            return self.notification(message, session_id, request.overrides).await;
        }
        if message.method == "initialize" {
            return self.initialize(message, session_id).await;
        }

        let Some(header) = session_id else {
            debug!(method = %message.method, "Request without session header");
            return EngineResponse::reply(
                ReplyStatus::BadRequest,
                Response::error(id, JsonRpcError::session_not_found()),
            );
        };
        let Some(session) = self.resolve(header).await else {
            debug!(method = %message.method, session_id = header, "Unknown or expired session");
            return EngineResponse::reply(
                ReplyStatus::NotFound,
                Response::error(
                    id,
                    ProtocolError::SessionNotFound(header.to_string()).into(),
                ),
            );
        };

        self.refresh(&session).await;
        debug!(method = %message.method, session_id = %session.id, "Dispatching request");
        let context = MethodContext {
            session: Some(session.clone()),
            overrides: request.overrides,
        };
        let response = self.handler.dispatch(message, context).await;
        EngineResponse::reply(ReplyStatus::Ok, response).for_session(&session)
    }

    /// Closes the session named by the `mcp-session-id` header.
    pub async fn close_session(&self, session_id: Option<&str>) -> CloseOutcome {
        let Some(id) = session_id.filter(|s| !s.is_empty()) else {
            return CloseOutcome::MissingHeader;
        };
        if self.resolve(id).await.is_none() {
            return CloseOutcome::NotFound;
        }
        match self.sessions.delete(id).await {
            Ok(true) => {
                info!(session_id = id, "Session closed");
                CloseOutcome::Closed
            }
            Ok(false) => CloseOutcome::NotFound,
            Err(e) => {
                warn!(session_id = id, error = %e, "Failed to close session");
                CloseOutcome::NotFound
            }
        }
    }

    async fn initialize(&self, message: Request, session_id: Option<&str>) -> EngineResponse {
        let id = message.id.clone().unwrap_or(Id::Null);

        if let Some(existing) = session_id {
            if let Some(session) = self.resolve(existing).await {
                return EngineResponse::reply(
                    ReplyStatus::Ok,
                    Response::error(id, JsonRpcError::invalid_request("session already initialized")),
                )
                .for_session(&session);
            }
        }

        let init = match prepare_initialize(message.params, &self.protocol_versions, &self.identity) {
            Ok(init) => init,
            Err(e) => return EngineResponse::reply(ReplyStatus::Ok, Response::error(id, e)),
        };

        match self.sessions.create(init.session).await {
            Ok(session) => {
                info!(
                    session_id = %session.id,
                    protocol_version = %session.protocol_version,
                    client = %session.client_info.get("name").and_then(|n| n.as_str()).unwrap_or("unknown"),
                    "Session initialized"
                );
                EngineResponse::reply(ReplyStatus::Ok, Response::success(id, init.result))
                    .for_session(&session)
            }
            Err(e) => {
                error!(error = %e, "Could not create session");
                EngineResponse::reply(
                    ReplyStatus::InternalError,
                    Response::error(id, JsonRpcError::internal_error("session store unavailable")),
                )
            }
        }
    }

    async fn notification(
        &self,
        message: Request,
        session_id: Option<&str>,
        overrides: CredentialOverrides,
    ) -> EngineResponse {
        let session = match session_id {
            Some(id) => self.resolve(id).await,
            None => None,
        };
        if let Some(session) = &session {
            self.refresh(session).await;
        }

        let mut reply = EngineResponse::accepted();
        if let Some(session) = &session {
            reply = reply.for_session(session);
        }
        self.handler
            .notify(message, MethodContext { session, overrides })
            .await;
        reply
    }

    /// Looks a session up, treating store failures as a miss.
    async fn resolve(&self, id: &str) -> Option<Session> {
        match self.sessions.get(id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id = id, error = %e, "Session lookup failed");
                None
            }
        }
    }

    async fn refresh(&self, session: &Session) {
        if let Err(e) = self.sessions.touch(&session.id).await {
            warn!(session_id = %session.id, error = %e, "Could not refresh session expiry");
        }
    }
}

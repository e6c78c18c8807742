// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! The `initialize` handshake.
//!
//! Unlike the other methods this one is not registered with the dispatcher:
//! it runs before a session exists, so the protocol engine calls
//! [`prepare`] directly and creates the session from the outcome.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::protocol::jsonrpc::error::JsonRpcError;
use crate::session::NewSession;

/// Request parameters for the initialize method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version the client wants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,

    /// Client capabilities, stored verbatim
    #[serde(default)]
    pub capabilities: Value,

    /// Client name and version, stored verbatim
    #[serde(default)]
    pub client_info: Value,
}

/// Name, version and usage notes the server announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Free-form instructions for the client
    pub instructions: Option<String>,
}

/// Initialize response from server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Negotiated protocol version
    pub protocol_version: String,

    /// Server capabilities
    pub capabilities: Value,

    /// Server name and version
    pub server_info: Value,

    /// Usage notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// What the engine needs to finish an `initialize` call.
#[derive(Debug, Clone)]
pub struct Initialization {
    /// Record to store for the new session
    pub session: NewSession,
    /// The JSON-RPC result
    pub result: Value,
}

/// Picks the protocol version for a client.
///
/// A missing request gets the newest supported version; anything not in
/// `supported` is rejected.
pub fn negotiate_version(
    requested: Option<&str>,
    supported: &[String],
) -> Result<String, JsonRpcError> {
    match requested {
        None => supported
            .first()
            .cloned()
            .ok_or_else(|| JsonRpcError::internal_error("no protocol versions configured")),
        Some(version) if supported.iter().any(|v| v == version) => Ok(version.to_string()),
        Some(version) => Err(JsonRpcError::unsupported_version(version, supported)),
    }
}

/// Validates the parameters and builds the handshake result.
pub fn prepare(
    params: Option<Value>,
    supported: &[String],
    identity: &ServerIdentity,
) -> Result<Initialization, JsonRpcError> {
    let params = match params {
        None | Some(Value::Null) => InitializeParams::default(),
        Some(value) => serde_json::from_value::<InitializeParams>(value)
            .map_err(|e| JsonRpcError::invalid_params(format!("initialize: {e}")))?,
    };

    let protocol_version = negotiate_version(params.protocol_version.as_deref(), supported)?;

    let result = InitializeResult {
        protocol_version: protocol_version.clone(),
        capabilities: json!({ "tools": { "listChanged": false } }),
        server_info: json!({ "name": identity.name, "version": identity.version }),
        instructions: identity.instructions.clone(),
    };
    let result = serde_json::to_value(result)
        .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;

    Ok(Initialization {
        session: NewSession {
            protocol_version,
            client_info: params.client_info,
            client_capabilities: params.capabilities,
        },
        result,
    })
}

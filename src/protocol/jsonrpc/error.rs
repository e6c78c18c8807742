// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Error types for the JSON-RPC 2.0 protocol handler.
//!
//! Standard codes follow the [JSON-RPC 2.0 specification](https://www.jsonrpc.org/specification#error_object);
//! `SessionNotFound` sits in the implementation-defined server range.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::protocol::ProtocolError;

/// JSON-RPC 2.0 error codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Parse error (-32700)
    /// Invalid JSON was received by the server.
    ParseError = -32700,

    /// Invalid Request (-32600)
    /// The JSON sent is not a valid Request object.
    InvalidRequest = -32600,

    /// Method not found (-32601)
    /// The method or tool does not exist.
    MethodNotFound = -32601,

    /// Invalid params (-32602)
    /// Invalid method parameter(s), including unsupported protocol versions.
    InvalidParams = -32602,

    /// Internal error (-32603)
    /// Internal JSON-RPC error.
    InternalError = -32603,

    /// Server error (-32000)
    /// Infrastructure failure, e.g. the session store is unavailable.
    ServerError = -32000,

    /// Session not found (-32001)
    /// The session id is missing, unknown, or expired; the client must initialize again.
    SessionNotFound = -32001,
}

impl ErrorCode {
    /// Returns a string description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError => "Server error",
            ErrorCode::SessionNotFound => "Session not found",
        }
    }

    /// Create an ErrorCode from a raw integer value.
    ///
    /// Returns None if the code is not one the server emits.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32600 => Some(ErrorCode::InvalidRequest),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            -32001 => Some(ErrorCode::SessionNotFound),
            c if (-32099..=-32000).contains(&c) => Some(ErrorCode::ServerError),
            _ => None,
        }
    }

    /// Returns the integer error code.
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        code as i32
    }
}

/// JSON-RPC error object as defined in the specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// The error code
    pub code: i32,

    /// A short description of the error
    pub message: String,

    /// Additional information about the error (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Creates a new JSON-RPC error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a new JSON-RPC error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Creates a standard parse error.
    pub fn parse_error() -> Self {
        Self::new(
            ErrorCode::ParseError,
            "Parse error: Invalid JSON was received",
        )
    }

    /// Creates a standard invalid request error.
    pub fn invalid_request<S: Into<String>>(reason: S) -> Self {
        Self::new(
            ErrorCode::InvalidRequest,
            format!("Invalid Request: {}", reason.into()),
        )
    }

    /// Creates a standard method not found error.
    pub fn method_not_found<S: Into<String>>(method: S) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Method not found: {}", method.into()),
        )
    }

    /// Creates the error returned for an unknown tool name.
    pub fn tool_not_found<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        Self::with_data(
            ErrorCode::MethodNotFound,
            format!("Tool not found: {name}"),
            json!({ "tool": name }),
        )
    }

    /// Creates a standard invalid params error.
    pub fn invalid_params<S: Into<String>>(msg: S) -> Self {
        Self::new(
            ErrorCode::InvalidParams,
            format!("Invalid params: {}", msg.into()),
        )
    }

    /// Creates an invalid params error naming the offending field.
    pub fn invalid_field<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        let field = field.into();
        Self::with_data(
            ErrorCode::InvalidParams,
            format!("Invalid params: {field}: {}", msg.into()),
            json!({ "field": field }),
        )
    }

    /// Creates the error returned when the requested protocol version is not offered.
    pub fn unsupported_version(requested: &str, supported: &[String]) -> Self {
        Self::with_data(
            ErrorCode::InvalidParams,
            format!("Unsupported protocol version: {requested}"),
            json!({ "requested": requested, "supported": supported }),
        )
    }

    /// Creates the error returned when a request needs a session it does not have.
    pub fn session_not_found() -> Self {
        Self::new(
            ErrorCode::SessionNotFound,
            "Session not found: send an initialize request to start a new session",
        )
    }

    /// Creates a standard internal error.
    pub fn internal_error<S: Into<String>>(msg: S) -> Self {
        Self::new(
            ErrorCode::InternalError,
            format!("Internal error: {}", msg.into()),
        )
    }

    /// Creates a server error for infrastructure failures.
    pub fn server_error<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorCode::ServerError, msg)
    }
}

/// Error type for JSON-RPC envelope processing.
#[derive(Debug, Error)]
pub enum Error {
    /// The body is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is JSON but not a valid request object
    #[error("JSON-RPC error: {0}")]
    JsonRpc(String),
}

impl Error {
    /// Converts the error to a JSON-RPC error.
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Error::Json(_) => JsonRpcError::parse_error(),
            Error::JsonRpc(msg) => JsonRpcError::invalid_request(msg.clone()),
        }
    }
}

impl From<ProtocolError> for JsonRpcError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidMessage(msg) => Self::invalid_request(msg),
            ProtocolError::MessageTooLarge { .. } => Self::invalid_request(err.to_string()),
            ProtocolError::InvalidParams(msg) => Self::invalid_params(msg),
            ProtocolError::UnsupportedVersion(version) => Self::with_data(
                ErrorCode::InvalidParams,
                format!("Unsupported protocol version: {version}"),
                json!({ "requested": version }),
            ),
            ProtocolError::SessionNotFound(_) => Self::session_not_found(),
            ProtocolError::Timeout(_) | ProtocolError::Other(_) => {
                Self::internal_error(err.to_string())
            }
        }
    }
}

/// Specialized Result type for JSON-RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

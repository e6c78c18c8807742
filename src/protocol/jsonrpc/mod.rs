// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! JSON-RPC 2.0 layer of the Nalu MCP Server.
//!
//! This module implements the [JSON-RPC 2.0 specification](https://www.jsonrpc.org/specification)
//! as used by MCP over streamable HTTP: one request or notification per POST,
//! no batches.
//!
//! # Example
//!
//! ```
//! use nalu_mcp_lib::protocol::jsonrpc::{validate_request, JsonRpcHandler, MethodContext};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut handler = JsonRpcHandler::new();
//! handler.register_method("echo", |params, _ctx| async move {
//!     Ok(params.unwrap_or(json!(null)))
//! });
//!
//! let request = validate_request(r#"{"jsonrpc":"2.0","method":"echo","params":{"m":"hi"},"id":1}"#)
//!     .unwrap();
//! let response = handler.dispatch(request, MethodContext::default()).await;
//! assert_eq!(response.result, Some(json!({"m": "hi"})));
//! # });
//! ```

pub mod error;
pub mod handler;
pub mod methods;
pub mod setup;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

// Re-exports
pub use error::{Error, ErrorCode, JsonRpcError, Result};
pub use handler::{JsonRpcHandler, MethodContext, MethodHandler, MethodResult};
pub use setup::{create_handler, register_standard_methods};
pub use types::{Id, Request, Response, JSONRPC_VERSION};
pub use validation::{parse_body, recover_id, validate_request, validate_value};

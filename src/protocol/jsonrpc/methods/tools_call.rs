// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Implementation of the JSON-RPC "tools/call" method handler.
//!
//! Lookup and argument validation failures are protocol errors; anything the
//! tool itself reports comes back as a result with `isError` set.

use std::sync::Arc;

use serde_json::Value;

use crate::protocol::jsonrpc::error::JsonRpcError;
use crate::protocol::jsonrpc::handler::{JsonRpcHandler, MethodContext, MethodResult};
use crate::tools::{CallContext, RegistryError, ToolRegistry};

/// Registers the tools/call method handler with the JSON-RPC handler.
pub fn register_tools_call_method(handler: &mut JsonRpcHandler, registry: Arc<ToolRegistry>) {
    handler.register_method("tools/call", move |params, context| {
        let registry = registry.clone();
        async move { handle_tools_call(&registry, params, context).await }
    });
}

impl From<RegistryError> for JsonRpcError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => JsonRpcError::tool_not_found(name),
            RegistryError::InvalidArguments { violation, .. } => {
                JsonRpcError::invalid_field(violation.field, violation.message)
            }
            RegistryError::Duplicate(name) => {
                JsonRpcError::internal_error(format!("tool {name} registered twice"))
            }
        }
    }
}

async fn handle_tools_call(
    registry: &ToolRegistry,
    params: Option<Value>,
    context: MethodContext,
) -> MethodResult {
    let params = params.unwrap_or(Value::Null);
    let name = match params.get("name") {
        Some(Value::String(name)) => name.as_str(),
        Some(_) => return Err(JsonRpcError::invalid_field("name", "must be a string")),
        None => return Err(JsonRpcError::invalid_field("name", "is required")),
    };

    let ctx = CallContext {
        session_id: context.session_id().to_string(),
        overrides: context.overrides,
    };
    let result = registry.call(name, params.get("arguments"), &ctx).await?;
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

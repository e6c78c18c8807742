// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Implementation of the JSON-RPC "tools/list" method handler.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::protocol::jsonrpc::error::JsonRpcError;
use crate::protocol::jsonrpc::handler::{JsonRpcHandler, MethodContext, MethodResult};
use crate::tools::{ToolInfo, ToolRegistry};

/// Response for the tools/list method.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    /// Every registered tool, in registration order
    pub tools: Vec<ToolInfo>,
}

/// Registers the tools/list method handler with the JSON-RPC handler.
pub fn register_tools_list_method(handler: &mut JsonRpcHandler, registry: Arc<ToolRegistry>) {
    handler.register_method("tools/list", move |params, context| {
        let registry = registry.clone();
        async move { handle_tools_list(&registry, params, context) }
    });
}

/// Returns the registry snapshot. Params, including a pagination cursor, are ignored.
fn handle_tools_list(
    registry: &ToolRegistry,
    _params: Option<Value>,
    _context: MethodContext,
) -> MethodResult {
    let result = ToolsListResult {
        tools: registry.list(),
    };
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

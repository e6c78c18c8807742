// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Setup and initialization utilities for the JSON-RPC handler.

use std::sync::Arc;

use crate::protocol::jsonrpc::handler::JsonRpcHandler;
use crate::protocol::jsonrpc::methods::{
    register_client_notifications, register_ping_method, register_tools_call_method,
    register_tools_list_method,
};
use crate::tools::ToolRegistry;

/// Registers all session-gated methods and notifications with the handler.
///
/// `initialize` is absent on purpose: the protocol engine answers it before
/// any session exists.
pub fn register_standard_methods(handler: &mut JsonRpcHandler, registry: Arc<ToolRegistry>) {
    register_tools_list_method(handler, registry.clone());
    register_tools_call_method(handler, registry);
    register_ping_method(handler);
    register_client_notifications(handler);
}

/// Creates a fully configured JSON-RPC handler for `registry`.
pub fn create_handler(registry: Arc<ToolRegistry>) -> JsonRpcHandler {
    let mut handler = JsonRpcHandler::new();
    register_standard_methods(&mut handler, registry);
    handler
}

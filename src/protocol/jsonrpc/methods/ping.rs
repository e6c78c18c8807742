//! `ping` liveness check and the client notifications the server understands.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::protocol::jsonrpc::handler::{JsonRpcHandler, MethodContext};

/// Registers the ping method handler with the JSON-RPC handler.
pub fn register_ping_method(handler: &mut JsonRpcHandler) {
    handler.register_method("ping", |_params, _context| async { Ok(json!({})) });
}

/// Registers handlers for `notifications/initialized` and `notifications/cancelled`.
pub fn register_client_notifications(handler: &mut JsonRpcHandler) {
    handler.register_notification(
        "notifications/initialized",
        |_params, context: MethodContext| async move {
            info!(session_id = %context.session_id(), "Client finished initialization");
        },
    );
    handler.register_notification(
        "notifications/cancelled",
        |params: Option<Value>, context: MethodContext| async move {
            let request_id = params
                .as_ref()
                .and_then(|p| p.get("requestId"))
                .cloned()
                .unwrap_or(Value::Null);
            let reason = params
                .as_ref()
                .and_then(|p| p.get("reason"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            debug!(session_id = %context.session_id(), %request_id, reason = %reason, "Client cancelled a request");
        },
    );
}

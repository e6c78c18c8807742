//! Transport module for the Nalu MCP Server.
//!
//! MCP is served over streamable HTTP only: `POST /mcp` carries one
//! JSON-RPC message, `DELETE /mcp` closes a session and `GET /health`
//! answers liveness probes.

pub mod http;

pub use http::{
    router, serve, serve_listener, AppState, HEALTH_PATH, MCP_PATH, SEARCH_ENGINE_HEADER,
    SEARCH_KEY_HEADER,
};

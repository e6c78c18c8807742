//! Protocol module for the Nalu MCP Server.
//!
//! This module implements MCP over JSON-RPC 2.0: envelope parsing and
//! validation, method dispatch, and the session state machine that decides
//! which requests may run.

pub mod engine;
pub mod jsonrpc;

pub use engine::{
    CloseOutcome, EngineRequest, EngineResponse, ProtocolEngine, ReplyStatus,
    PROTOCOL_VERSION_HEADER, SESSION_HEADER,
};

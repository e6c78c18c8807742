// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! MCP method handlers.

pub mod initialize;
pub mod ping;
pub mod tools_call;
pub mod tools_list;

// Re-exports
pub use initialize::{negotiate_version, prepare as prepare_initialize, ServerIdentity};
pub use ping::{register_client_notifications, register_ping_method};
pub use tools_call::register_tools_call_method;
pub use tools_list::register_tools_list_method;

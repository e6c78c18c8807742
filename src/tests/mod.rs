//! Cross-module tests for the Nalu MCP Server.
//!
//! Unit tests live next to the code they cover; the modules here exercise
//! configuration loading, error plumbing, the session lifecycle across
//! engine instances and the search tool end to end.

pub mod test_utils;

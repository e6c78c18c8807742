//! Cross-module tests for the JSON-RPC layer.

// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Request validation utilities for the JSON-RPC 2.0 handler.
//!
//! Parsing happens in two steps so that a structurally invalid request can
//! still be answered with the `id` it carried: [`parse_body`] only checks
//! that the body is JSON, [`validate_value`] checks the envelope.

use super::error::{Error, Result};
use super::types::{Id, Request, JSONRPC_VERSION};
use serde_json::Value;

/// Parses a request body into JSON.
pub fn parse_body(body: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(body)?)
}

/// Validates a parsed JSON value as a single JSON-RPC 2.0 request.
///
/// Performs the following checks:
/// - the value is an object (batches are not accepted)
/// - `jsonrpc` is exactly "2.0"
/// - `method` is a non-empty string
/// - `params`, if present, is an object, an array or null
/// - `id`, if present, is a string, an integer or null
pub fn validate_value(value: Value) -> Result<Request> {
    match &value {
        Value::Object(_) => {}
        Value::Array(_) => {
            return Err(Error::JsonRpc(
                "Batch requests are not supported".to_string(),
            ))
        }
        _ => {
            return Err(Error::JsonRpc(
                "Invalid JSON-RPC request, must be an object".to_string(),
            ))
        }
    }

    match value.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(other) => {
            return Err(Error::JsonRpc(format!(
                "Invalid JSON-RPC version: {other}, must be 2.0"
            )))
        }
        None => return Err(Error::JsonRpc("Missing jsonrpc member".to_string())),
    }

    if !matches!(value.get("method"), Some(Value::String(_))) {
        return Err(Error::JsonRpc("Method must be a string".to_string()));
    }

    let request: Request =
        serde_json::from_value(value).map_err(|e| Error::JsonRpc(e.to_string()))?;
    validate_single_request(&request)?;
    Ok(request)
}

/// Parses and validates a request body in one step.
pub fn validate_request<T: AsRef<[u8]>>(body: T) -> Result<Request> {
    validate_value(parse_body(body.as_ref())?)
}

/// Best-effort `id` of a request that failed validation.
pub fn recover_id(value: &Value) -> Id {
    value
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
        .unwrap_or(Id::Null)
}

fn validate_single_request(request: &Request) -> Result<()> {
    if request.method.is_empty() {
        return Err(Error::JsonRpc("Method cannot be empty".to_string()));
    }

    if let Some(ref params) = request.params {
        if !params.is_object() && !params.is_array() && !params.is_null() {
            return Err(Error::JsonRpc(
                "Params must be an object, array, or null".to_string(),
            ));
        }
    }

    Ok(())
}

//! Tool registry.
//!
//! Tools are registered once at startup and looked up by name for every
//! `tools/call`. The registry validates arguments against the tool's schema
//! before the handler runs, and folds handler failures (errors and panics)
//! into `isError` results so they never become protocol errors.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

pub mod schema;
pub mod search;
pub mod time;

pub use schema::{
    input_schema, parse_arguments, saturating_integer, NoArguments, SchemaViolation, ToolArguments,
};
pub use search::{SearchArgs, SearchTool};
pub use time::GetTimeTool;

/// Per-call credentials taken from request headers.
///
/// They apply to exactly one `tools/call` and fall back to the process-level
/// configuration field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialOverrides {
    /// Search API key
    pub search_api_key: Option<String>,
    /// Search engine id
    pub search_engine_id: Option<String>,
}

impl CredentialOverrides {
    /// Returns true when no override was supplied.
    pub fn is_empty(&self) -> bool {
        self.search_api_key.is_none() && self.search_engine_id.is_none()
    }
}

/// Information about the invocation passed to a tool handler.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Session the call belongs to
    pub session_id: String,
    /// Credential overrides for this call
    pub overrides: CredentialOverrides,
}

/// One item of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain or JSON-encoded text
    Text {
        /// The text
        text: String,
    },
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Output items
    pub content: Vec<Content>,
    /// True when the tool failed; the text explains why
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A successful result carrying pretty-printed JSON.
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    /// A failed result with a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Concatenated text of all content items.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Failure reported by a tool handler.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Credentials missing or rejected by an upstream service
    #[error("{0}")]
    Credentials(String),

    /// An upstream service failed or timed out
    #[error("{0}")]
    Upstream(String),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

/// Handler behind a tool name.
#[async_trait]
pub trait ToolHandler: Send + Sync + fmt::Debug + 'static {
    /// Arguments the tool accepts; their schema is advertised in `tools/list`.
    type Args: ToolArguments;

    /// Runs the tool with validated arguments.
    async fn call(&self, args: Self::Args, ctx: &CallContext) -> Result<CallToolResult, ToolError>;
}

type ToolFuture<'a> = BoxFuture<'a, Result<CallToolResult, ToolError>>;

/// Object-safe view of a handler: arguments are parsed before the call starts.
trait DispatchTool: Send + Sync + fmt::Debug {
    fn prepare<'a>(
        &'a self,
        arguments: Option<&Value>,
        ctx: &'a CallContext,
    ) -> Result<ToolFuture<'a>, SchemaViolation>;
}

impl<H: ToolHandler> DispatchTool for H {
    fn prepare<'a>(
        &'a self,
        arguments: Option<&Value>,
        ctx: &'a CallContext,
    ) -> Result<ToolFuture<'a>, SchemaViolation> {
        let args = parse_arguments::<H::Args>(arguments)?;
        Ok(self.call(args, ctx))
    }
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    input_schema: Value,
    handler: Arc<dyn DispatchTool>,
}

impl ToolDescriptor {
    /// Describes `handler` under `name`, deriving its input schema from the argument type.
    pub fn new<H: ToolHandler>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: H,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: input_schema::<H::Args>(),
            handler: Arc::new(handler),
        }
    }

    /// Unique tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON Schema of the arguments.
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Serialized form of a tool in `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name
    pub name: String,
    /// Description
    pub description: String,
    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Registry lookup and validation failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No tool with this name
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The arguments do not match the tool's schema
    #[error("Invalid arguments for {tool}: {violation}")]
    InvalidArguments {
        /// Tool name
        tool: String,
        /// The offending field
        violation: SchemaViolation,
    },

    /// A second tool with an existing name was registered
    #[error("Tool {0} is already registered")]
    Duplicate(String),
}

/// Name-indexed table of tools, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool. Names must be unique.
    pub fn register(&mut self, tool: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&tool.name) {
            return Err(RegistryError::Duplicate(tool.name));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Looks a tool up by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Snapshot of every tool for `tools/list`.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    /// Resolves, validates and runs a tool.
    ///
    /// Only lookup and validation failures are returned as errors; anything
    /// that goes wrong inside the handler is reported with `isError = true`.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<&Value>,
        ctx: &CallContext,
    ) -> Result<CallToolResult, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let call = tool
            .handler
            .prepare(arguments, ctx)
            .map_err(|violation| RegistryError::InvalidArguments {
                tool: name.to_string(),
                violation,
            })?;

        debug!(tool = name, session_id = %ctx.session_id, "Calling tool");
        let outcome = AssertUnwindSafe(call).catch_unwind().await;

        Ok(match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool failed");
                CallToolResult::error(e.to_string())
            }
            Err(_) => {
                error!(tool = name, "Tool handler panicked");
                CallToolResult::error(format!("Tool {name} failed unexpectedly"))
            }
        })
    }
}

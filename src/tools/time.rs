//! `get_time` tool.

use async_trait::async_trait;
use chrono::Utc;

use super::{CallContext, CallToolResult, NoArguments, ToolDescriptor, ToolError, ToolHandler};

/// Format of the returned timestamp.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reports the current UTC date and time.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetTimeTool;

impl GetTimeTool {
    /// Registry entry for this tool.
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("get_time", "Get the current UTC date and time.", Self)
    }
}

#[async_trait]
impl ToolHandler for GetTimeTool {
    type Args = NoArguments;

    async fn call(&self, _args: NoArguments, _ctx: &CallContext) -> Result<CallToolResult, ToolError> {
        Ok(CallToolResult::text(
            Utc::now().format(TIME_FORMAT).to_string(),
        ))
    }
}

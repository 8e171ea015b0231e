//! Merges local [`Tool`] implementations and remote MCP tool sources behind one
//! [`ToolSource`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};

use super::Tool;

/// Registry of tools by name, callable either directly (`call_tool`) or with an
/// explicit per-call [`ToolCallContext`] (`call_tool_with_context`, used by the
/// dispatcher and by [`super::BatchTool`]).
///
/// Registration takes `&self` (not `&mut self`) behind an internal `RwLock` so the
/// same `Arc<AggregateToolSource>` can be shared between the agent loop, the MCP
/// adapter (which registers tools asynchronously after a handshake), and the batch
/// tool (which calls back into it).
pub struct AggregateToolSource {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    call_context: RwLock<Option<ToolCallContext>>,
}

impl Default for AggregateToolSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateToolSource {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            call_context: RwLock::new(None),
        }
    }

    /// Registers a tool synchronously (blocking only on the internal lock).
    pub fn register_sync(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().unwrap().insert(name, tool);
    }

    /// Registers a tool from an async context (e.g. after an MCP `tools/list` call).
    /// `async` for symmetry with `ToolSource` and so callers can `.await` it without
    /// caring that registration itself never yields.
    pub async fn register_async(&self, tool: Box<dyn Tool>) {
        let tool: Arc<dyn Tool> = Arc::from(tool);
        let name = tool.name().to_string();
        self.tools.write().unwrap().insert(name, tool);
    }

    pub async fn call_tool_with_context(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let tool = {
            let tools = self.tools.read().unwrap();
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))?
        };
        tool.call(args, ctx).await
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.tools.read().unwrap().contains_key(name)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().unwrap().len()
    }
}

#[async_trait]
impl ToolSource for AggregateToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        let tools = self.tools.read().unwrap();
        Ok(tools.values().map(|t| t.spec()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let ctx = self.call_context.read().unwrap().clone();
        self.call_tool_with_context(name, arguments, ctx.as_ref()).await
    }

    fn set_call_context(&self, ctx: Option<ToolCallContext>) {
        *self.call_context.write().unwrap() = ctx;
    }
}

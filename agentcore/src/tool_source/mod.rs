//! Tool execution contracts: [`ToolSpec`], [`ToolSourceError`], [`ToolCallContent`],
//! [`ToolCallContext`], and the [`ToolSource`] trait that [`McpToolSource`] implements.
//!
//! Local (non-MCP) tools implement [`crate::tools::Tool`] instead and are gathered
//! behind a single [`ToolSource`] by [`crate::tools::AggregateToolSource`].

mod context;
pub mod mcp;

pub use context::ToolCallContext;
pub use mcp::{
    LocalMcpServerConfig, McpManager, McpOAuthConfig, McpPrompt, McpPromptResult, McpResource,
    McpResourceContent, McpServerConfig, McpServerStatus, McpSessionError, McpToolSource,
    RemoteMcpServerConfig,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Approval class a tool's invocations fall under.
///
/// Drives `ApprovalGate`: `None` always runs, `Terminal`/`Dangerous` run only
/// when the thread's auto-approve policy covers that class, otherwise the
/// dispatcher blocks on the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalType {
    None,
    Terminal,
    Dangerous,
}

/// Broad effect class a tool belongs to.
///
/// `Write`/`Delete` drive the dispatcher's snapshot phase (§4.8): before such a
/// call runs, the target's current content is captured into the active
/// checkpoint so the edit can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Read,
    Write,
    Delete,
    Exec,
    Search,
    Lsp,
    Plan,
    Net,
    Ui,
    Meta,
}

/// JSON Schema description of a tool, as sent to the provider's `tools` field and
/// returned by MCP `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
    pub approval_type: ApprovalType,
    pub category: ToolCategory,
    /// Whether this tool is safe to run concurrently with other calls in the
    /// same dispatch batch (§4.8 concurrency pool).
    pub parallel_safe: bool,
}

impl ToolSpec {
    /// Builds a spec with the common defaults (`ApprovalType::None`, `ToolCategory::Read`,
    /// `parallel_safe: true`); override fields with the builder methods below for tools
    /// that need something else.
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
            approval_type: ApprovalType::None,
            category: ToolCategory::Read,
            parallel_safe: true,
        }
    }

    pub fn with_approval_type(mut self, approval_type: ApprovalType) -> Self {
        self.approval_type = approval_type;
        self
    }

    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_parallel_safe(mut self, parallel_safe: bool) -> Self {
        self.parallel_safe = parallel_safe;
        self
    }
}

/// Result of one successful tool call.
///
/// `text` is what gets wrapped into a `Role::Tool` message and sent back to the
/// model. Kept to a single field deliberately: richer structured results (e.g. a
/// diff, an image) are still represented as text the model can read, matching how
/// every provider's tool-result message works on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallContent {
    pub text: String,
}

/// Errors a tool or tool source can raise.
///
/// Maps onto the dispatcher's retry policy: `Timeout` and `Transport` are retried
/// with backoff (transient), the rest are not (deterministic given the same input).
#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("jsonrpc error: {0}")]
    JsonRpc(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A source of tools: lists their specs, executes calls by name.
///
/// Implemented by [`McpToolSource`] (one MCP server) and by
/// [`crate::tools::AggregateToolSource`] (every local `Tool` plus zero or more
/// MCP sources, merged behind one name->spec map).
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError>;

    /// Sets context (recent messages, thread id) available to calls made through
    /// this source. Default is a no-op; sources that ignore context (MCP) keep it.
    fn set_call_context(&self, _ctx: Option<ToolCallContext>) {}
}

//! Top-level error type threaded through the provider, dispatcher, and agent loop.

use thiserror::Error;

use crate::tool_source::ToolSourceError;

/// Errors the agent loop surfaces to its caller.
///
/// Component-specific errors (provider SSE parsing, tool execution, MCP transport)
/// convert into this via `#[from]` rather than being re-wrapped by hand at each
/// call site.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolSourceError),

    #[error("compaction error: {0}")]
    Compaction(String),

    #[error("loop guard tripped: {0}")]
    LoopDetected(String),

    #[error("context budget exceeded: needed {needed} tokens, budget is {budget}")]
    ContextBudgetExceeded { needed: u32, budget: u32 },

    #[error("thread store error: {0}")]
    Store(#[from] crate::conversation::StoreError),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

//! Per-call context threaded into [`Tool::call`](crate::tools::Tool::call).

use crate::conversation::Message;

/// Context available to a tool while it executes.
///
/// Built by the [`AgentLoop`](crate::agent_loop::AgentLoop) / [`ToolDispatcher`](crate::dispatcher::ToolDispatcher)
/// before dispatching a call; most tools ignore it (`call` takes `Option<&ToolCallContext>`
/// and local tools like `read`/`write_file` never need it). Tools that need session identity
/// (the plan tools, MCP tools scoping to a thread) read `thread_id`.
#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    /// Recent messages in the thread, most recent last. Populated for tools that
    /// want conversational context without re-reading the whole store.
    pub recent_messages: Vec<Message>,
    /// Thread id for the call, used for session-scoped storage (e.g. per-thread plan).
    pub thread_id: Option<String>,
    /// User id, for multi-tenant deployments; opaque to this crate.
    pub user_id: Option<String>,
}

impl ToolCallContext {
    pub fn new(recent_messages: Vec<Message>) -> Self {
        Self {
            recent_messages,
            thread_id: None,
            user_id: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

//! Conversation data model: threads, messages, tool calls, checkpoints, plans.
//!
//! This is the in-memory shape the rest of the crate builds on: [`AgentLoop`](crate::agent_loop::AgentLoop)
//! appends [`Message`]s to a [`Thread`], [`ToolDispatcher`](crate::dispatcher::ToolDispatcher) fills in
//! [`ToolCall`] results, and [`ContextCompactor`](crate::compress::ContextCompactor) replaces runs of
//! messages with summaries when a thread grows past its budget.

mod store;

pub use store::{ConversationStore, StoreError};

use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Lifecycle state of a single tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    AwaitingApproval,
    Running,
    Completed,
    Failed,
    Denied,
}

/// One tool invocation requested by the model, and its eventual outcome.
///
/// `id` is the provider's tool-call id (echoed back in the follow-up `tool` message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub status: ToolCallStatus,
    /// Set once the call finishes (successfully or not); `None` while pending/running.
    pub result_text: Option<String>,
    pub error: Option<String>,
    /// Opaque UI-side payload a tool may attach to its result (e.g. a diff to render);
    /// the core never interprets this, only threads it through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich_content: Option<serde_json::Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            status: ToolCallStatus::Pending,
            result_text: None,
            error: None,
            rich_content: None,
        }
    }
}

/// Token accounting for one LLM turn, as reported by the provider (or estimated
/// locally when the provider omits usage, e.g. Anthropic's prompt-cache deltas).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cached_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Outcome of a single Tool-role message, distinct from [`ToolCallStatus`] (the
/// call's own lifecycle enum) — this is the three-way result the spec's message
/// data model records once a call has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMessageStatus {
    Success,
    ToolError,
    Rejected,
}

impl ToolMessageStatus {
    fn from_call_status(status: ToolCallStatus) -> Self {
        match status {
            ToolCallStatus::Denied => ToolMessageStatus::Rejected,
            ToolCallStatus::Failed => ToolMessageStatus::ToolError,
            _ => ToolMessageStatus::Success,
        }
    }
}

/// A single turn in a [`Thread`].
///
/// `content` holds the visible text (assistant reasoning is tracked separately,
/// see [`crate::stream_event::StreamEvent::ReasoningDelta`]); `tool_calls` is only
/// populated on assistant messages that requested tool use; `tool_call_id`,
/// `tool_name`, and `status` are only populated on `Role::Tool` messages replying
/// to one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool this result came from (§3's `Tool.toolName`); `None` for
    /// non-`Role::Tool` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// `success | tool_error | rejected` outcome of the call this message reports
    /// on; `None` for non-`Role::Tool` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolMessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Approximate token count for this message alone, used by the compactor's
    /// importance scoring without re-counting on every pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    /// "Thinking" text accumulated from `StreamEvent::Reasoning` deltas, kept apart
    /// from `content` so a UI can render it separately (or not at all).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// True while an assistant message's `content`/`tool_calls` are still being
    /// appended to from an in-flight provider stream.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
    /// Set by the compactor when this message has been folded into a summary and
    /// is eligible for pruning from the live window (still retained in the store).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacted_at: Option<i64>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            status: None,
            usage: None,
            token_count: None,
            reasoning: None,
            is_streaming: false,
            compacted_at: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut m = Self::new(Role::Tool, content);
        m.tool_call_id = Some(tool_call_id.into());
        m
    }

    /// Builds a Tool-role message with `tool_name`/`status` filled in from the
    /// originating call, per §3's `Tool.toolCallId, toolName, content, status` shape.
    pub fn tool_result_for_call(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut m = Self::new(Role::Tool, content);
        m.tool_call_id = Some(call.id.clone());
        m.tool_name = Some(call.name.clone());
        m.status = Some(ToolMessageStatus::from_call_status(call.status));
        m
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }
}

/// Status of a [`Plan`], mirrors `create_plan`/`update_plan` tool lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanItemStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: String,
    pub title: String,
    pub status: PlanItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A checklist the agent maintains across a long-running task.
///
/// One active plan per thread; `create_plan` replaces it, `update_plan` mutates
/// item statuses in place. Persisted by the `create_plan`/`update_plan` tools under
/// the working folder so it survives process restarts (see [`crate::tools::plan`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub items: Vec<PlanItem>,
    pub status: PlanStatus,
}

impl Plan {
    pub fn new(items: Vec<PlanItem>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            items,
            status: PlanStatus::Active,
        }
    }
}

/// A saved point a thread can be restored to, e.g. before a `SessionHandoff` compaction
/// or before an irreversible tool call. See `ContextCompactor` level 5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub thread_id: String,
    pub message_count: usize,
    pub created_at_ms: i64,
    pub label: Option<String>,
    /// File path -> content before this turn's first write/delete touched it, or
    /// `None` if the path didn't exist yet (so undo means "delete it"). Filled in
    /// by [`crate::dispatcher::ToolDispatcher`]'s snapshot phase, one entry per
    /// path the first time (not every) a call in this turn touches it.
    #[serde(default)]
    pub snapshots: std::collections::HashMap<String, Option<String>>,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<String>, message_count: usize, created_at_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            message_count,
            created_at_ms,
            label: None,
            snapshots: std::collections::HashMap::new(),
        }
    }
}

/// A conversation: ordered messages, optional active plan, optional checkpoints.
///
/// Invariants (see the compaction ladder in [`crate::compress`]):
/// - Messages are append-only from the agent loop's perspective; compaction replaces
///   a contiguous prefix with a single summary message rather than mutating history.
/// - A `Role::Tool` message's `tool_call_id` always refers to a `ToolCall::id` on some
///   earlier `Role::Assistant` message in the same thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub plan: Option<Plan>,
    pub checkpoints: Vec<Checkpoint>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Thread {
    pub fn new(id: impl Into<String>, created_at_ms: i64) -> Self {
        Self {
            id: id.into(),
            title: None,
            messages: Vec::new(),
            plan: None,
            checkpoints: Vec::new(),
            created_at_ms,
            updated_at_ms: created_at_ms,
        }
    }

    /// Appends `message`; a `Role::User` message opens a new turn and gets a
    /// fresh [`Checkpoint`] (§3: "A Checkpoint message precedes each User turn"),
    /// so the dispatcher's snapshot phase has somewhere to merge its captures.
    pub fn push(&mut self, message: Message, now_ms: i64) {
        if message.role == Role::User {
            self.checkpoints.push(Checkpoint::new(self.id.clone(), self.messages.len(), now_ms));
        }
        self.messages.push(message);
        self.updated_at_ms = now_ms;
    }

    /// Returns the last assistant message's text, if any (e.g. for a CLI's final print).
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

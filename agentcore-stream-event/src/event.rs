//! The normalized stream event type every provider adapter emits into.
//!
//! Text and reasoning deltas, tool-call start/delta/end, and usage are the only
//! variants: everything provider-specific (SSE framing, vendor JSON shapes) is
//! resolved before a [`StreamEvent`] is produced. `text`/`reasoning` may freely
//! interleave; every `toolCallDelta` is preceded by exactly one `toolCallStart`
//! for that id; `toolCallEnd` fires exactly once per id, after its start and
//! zero-or-more deltas. `usage` may appear at any position; if emitted more than
//! once, the later event supersedes the earlier one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Phase of a `reasoning` event, mirroring how "thinking" blocks are framed by
/// providers that expose them (Anthropic's `thinking` content blocks, an OpenAI-
/// compatible `reasoningField`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningPhase {
    Start,
    Delta,
    End,
}

/// A completed tool call: arguments are final, parsed JSON, delivered exactly
/// once via [`StreamEvent::ToolCallEnd`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Token accounting reported by the provider for one completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
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

/// One normalized event from a provider's streaming response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// Assistant-visible text fragment; accumulated verbatim into `Assistant.content`.
    Text { delta: String },
    /// "Thinking" text; accumulated separately from visible content.
    Reasoning { delta: String, phase: ReasoningPhase },
    /// A new tool call is beginning; arguments will arrive as `ToolCallDelta` fragments.
    ToolCallStart { id: String, name: String },
    /// Appends a fragment to `id`'s argument string; providers may also refine the name
    /// mid-stream (e.g. OpenAI's array-index-keyed tool call deltas).
    ToolCallDelta {
        id: String,
        arguments_fragment: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// The arguments JSON is complete and parsed. Fires exactly once per id.
    ToolCallEnd { tool_call: ToolCall },
    /// Optional; if emitted more than once, the later event supersedes the earlier one.
    Usage { usage: TokenUsage },

    /// A provider call is about to start.
    #[serde(rename = "llm:start")]
    LlmStart,
    /// A provider call finished successfully (its stream was fully drained).
    #[serde(rename = "llm:done")]
    LlmDone,
    /// A provider call failed.
    #[serde(rename = "llm:error")]
    LlmError { message: String },

    /// A tool call needs approval before it can run.
    #[serde(rename = "tool:pending")]
    ToolPending { id: String, name: String },
    /// A tool call has been approved (or needed none) and started executing.
    #[serde(rename = "tool:running")]
    ToolRunning { id: String, name: String },
    /// A tool call finished successfully.
    #[serde(rename = "tool:completed")]
    ToolCompleted { id: String },
    /// A tool call failed.
    #[serde(rename = "tool:error")]
    ToolError { id: String, message: String },
    /// A tool call was rejected by the user, or skipped because a dependency was rejected.
    #[serde(rename = "tool:rejected")]
    ToolRejected { id: String },

    /// The compactor picked a new ladder level for this thread.
    #[serde(rename = "context:level")]
    ContextLevel { level: u8, ratio: f32 },
    /// Messages older than the sliding-window pivot became eligible for pruning.
    #[serde(rename = "context:prune")]
    ContextPrune { pruned_count: usize },
    /// A structured summary was generated over a range of turns.
    #[serde(rename = "context:summary")]
    ContextSummary { turn_from: usize, turn_to: usize },
    /// A session handoff document was generated and the prior thread replaced.
    #[serde(rename = "context:handoff")]
    ContextHandoff,

    /// The agent loop began processing a `send` invocation.
    #[serde(rename = "loop:start")]
    LoopStart,
    /// One iteration of the agent loop completed.
    #[serde(rename = "loop:iteration")]
    LoopIteration { iteration: u32 },
    /// The agent loop exited.
    #[serde(rename = "loop:end")]
    LoopEnd { reason: String },
    /// The loop detector (or the max-iterations guard) tripped.
    #[serde(rename = "loop:warning")]
    LoopWarning { reason: String },
}

impl StreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        StreamEvent::Text { delta: delta.into() }
    }

    pub fn reasoning(delta: impl Into<String>, phase: ReasoningPhase) -> Self {
        StreamEvent::Reasoning {
            delta: delta.into(),
            phase,
        }
    }

    pub fn tool_call_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        StreamEvent::ToolCallStart {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn tool_call_delta(id: impl Into<String>, arguments_fragment: impl Into<String>) -> Self {
        StreamEvent::ToolCallDelta {
            id: id.into(),
            arguments_fragment: arguments_fragment.into(),
            name: None,
        }
    }

    pub fn tool_call_end(tool_call: ToolCall) -> Self {
        StreamEvent::ToolCallEnd { tool_call }
    }

    pub fn usage(usage: TokenUsage) -> Self {
        StreamEvent::Usage { usage }
    }

    /// Serializes this event to a JSON object (no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

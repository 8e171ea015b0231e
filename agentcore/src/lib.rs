//! # agentcore
//!
//! Core library for an AI coding-assistant agent: provider abstraction and
//! streaming parser, the agent loop / scheduler, the tool execution engine,
//! and the context compression ladder.
//!
//! ## Main modules
//!
//! - [`provider`]: [`Provider`] trait, [`ChatRequest`]/[`ChatResult`]/[`EventStream`];
//!   concrete providers ([`provider::AnthropicProvider`], [`provider::OpenAiProvider`],
//!   [`provider::GeminiProvider`], [`provider::CustomHttpProvider`]); [`provider::MessageAdapter`]
//!   for provider-shaped message conversion; [`provider::TokenAccounter`] for exact BPE counting.
//! - [`agent_loop`]: [`AgentLoop`], [`AgentLoopConfig`], [`ExecutionContext`], [`ChatMode`],
//!   [`StopReason`] — the round-based send loop that ties providers, tools, and compaction together.
//! - [`dispatcher`]: [`ToolDispatcher`] — concurrent tool-call execution with approval gating.
//! - [`loop_detector`]: [`LoopDetector`] — detects repeated tool calls and stuck write/read cycles.
//! - [`compress`]: [`ContextCompactor`] and the L0-L4 compaction ladder, [`Turn`] grouping,
//!   [`StructuredSummary`] / [`HandoffDocument`].
//! - [`tool_source`]: [`ToolSource`] trait, [`ToolSpec`], MCP ([`tool_source::McpToolSource`]).
//! - [`tools`]: built-in tools (file, search, run_command, web, lsp, plan, batch) and
//!   [`tools::AggregateToolSource`], [`tools::HostFacade`].
//! - [`approval`]: [`ApprovalGate`], [`ApprovalDecision`], [`ApprovalOutcome`].
//! - [`conversation`]: [`Thread`], [`Message`], [`Role`], [`ToolCall`], [`Checkpoint`], [`Plan`],
//!   [`conversation::ConversationStore`].
//! - [`event_bus`]: [`EventBus`] — per-thread broadcast of [`stream_event::StreamEvent`]s.
//! - [`model_spec`]: context-limit resolution ([`ModelSpec`], [`CompositeResolver`], models.dev client).
//! - [`config`]: [`build_config_summary`] and friends, for `--verbose` / log output.
//! - [`cache`]: [`Cache`] trait, [`InMemoryCache`] (TTL-bounded).
//! - [`error`]: [`AgentError`].

pub mod agent_loop;
pub mod approval;
pub mod cache;
pub mod compress;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod event_bus;
pub mod loop_detector;
pub mod model_spec;
pub mod provider;
pub mod tool_source;
pub mod tools;

pub use agent_loop::{AgentLoop, AgentLoopConfig, ChatMode, ExecutionContext, StopReason};
pub use approval::{ApprovalDecision, ApprovalError, ApprovalGate, ApprovalOutcome};
pub use cache::{Cache, CacheError, InMemoryCache};
pub use compress::{
    CompactionLevel, CompactionOutcome, CompactorConfig, ContextCompactor, DecisionPoint,
    FileChangeRecord, HandoffDocument, StructuredSummary, Turn,
};
pub use config::{
    build_config_summary, ConfigSection, LlmConfigSummary, RunConfigSummary,
    RunConfigSummarySource, ToolConfigSummary,
};
pub use conversation::{
    Checkpoint, ConversationStore, Message, Plan, PlanItem, PlanItemStatus, PlanStatus, Role,
    StoreError, Thread, TokenUsage, ToolCall, ToolCallStatus, ToolMessageStatus,
};
pub use dispatcher::{DispatchOutcome, FileChange, ToolDispatcher};
pub use error::AgentError;
pub use event_bus::EventBus;
pub use loop_detector::{LoopCheck, LoopDetector};
pub use model_spec::{
    CachedResolver, CompositeResolver, ConfigOverride, LocalFileResolver, ModelLimitResolver,
    ModelSpec, ModelsDevResolver, ResolverRefresher,
};
pub use provider::{
    build_provider, extract_xml_tool_calls, strip_xml_tool_calls, AdapterConfig,
    AnthropicProvider, ChatRequest, ChatResult, CustomHttpProvider, ErrorKind, EventStream,
    GeminiProvider, LlmConfig, LlmConfigError, MessageAdapter, MockProvider, OpenAiProvider,
    Protocol, Provider, ProviderError, ProviderKind, TokenAccounter, ToolAdapter, VisionConfig,
};
pub use tool_source::{
    ApprovalType, LocalMcpServerConfig, McpManager, McpOAuthConfig, McpPrompt, McpPromptResult,
    McpResource, McpResourceContent, McpServerConfig, McpServerStatus, McpSessionError,
    McpToolSource, RemoteMcpServerConfig, ToolCallContent, ToolCallContext, ToolCategory,
    ToolSource, ToolSourceError, ToolSpec,
};
pub use tools::{
    register_builtin_tools, AggregateToolSource, ApplyPatchTool, BatchTool,
    CodebaseSearchTool, CreateFileOrFolderTool, CreatePlanTool, DeleteFileOrFolderTool,
    EditFileTool, GlobTool, HostFacade, LsTool, LspTool, MultieditTool, ReadFileTool,
    ReadTracker, ReadUrlTool, ReplaceFileContentTool, RunCommandTool, SearchFilesTool,
    SearchInFileTool, Tool, UpdatePlanTool, WebSearchTool, WriteFileTool,
};

/// When running `cargo test -p agentcore`, initializes tracing from `RUST_LOG` so that
/// unit tests in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}

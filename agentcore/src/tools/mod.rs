//! Built-in tool implementations and the registry that assembles them.
//!
//! Every tool implements [`Tool`] and carries its own [`crate::tool_source::ToolSpec`]
//! (schema, approval class, category, parallelism). [`register_builtin_tools`] wires
//! the shared state (a single [`read_tracker::ReadTracker`] per working folder) across
//! the file tools and registers everything, plus the MCP adapter and the batch tool,
//! into one [`aggregate_source::AggregateToolSource`] for the dispatcher to call through.

pub mod aggregate_source;
pub mod batch;
pub mod file;
pub mod lsp;
pub mod mcp_adapter;
pub mod plan;
pub mod read_tracker;
pub mod run_command;
pub mod search;
#[allow(clippy::module_inception)]
pub mod r#trait;
pub mod web;

pub use aggregate_source::AggregateToolSource;
pub use batch::{BatchTool, TOOL_BATCH};
pub use file::{
    ApplyPatchTool, CreateFileOrFolderTool, DeleteFileOrFolderTool, EditFileTool, GlobTool,
    LsTool, MultieditTool, ReadFileTool, ReplaceFileContentTool, WriteFileTool,
    TOOL_APPLY_PATCH, TOOL_CREATE_FILE_OR_FOLDER, TOOL_DELETE_FILE_OR_FOLDER, TOOL_EDIT_FILE,
    TOOL_GLOB, TOOL_LS, TOOL_MULTIEDIT, TOOL_READ_FILE, TOOL_REPLACE_FILE_CONTENT,
    TOOL_WRITE_FILE,
};
pub use lsp::{HostFacade, LspTool, TOOL_LSP};
pub use mcp_adapter::{register_mcp_tools, McpToolAdapter};
pub use plan::{CreatePlanTool, TOOL_CREATE_PLAN, TOOL_UPDATE_PLAN, UpdatePlanTool};
pub use r#trait::Tool;
pub use read_tracker::ReadTracker;
pub use run_command::{RunCommandTool, TOOL_RUN_COMMAND};
pub use search::{
    CodebaseSearchTool, SearchFilesTool, SearchInFileTool, TOOL_CODEBASE_SEARCH,
    TOOL_SEARCH_FILES, TOOL_SEARCH_IN_FILE,
};
pub use web::{ReadUrlTool, WebSearchTool, TOOL_READ_URL, TOOL_WEB_SEARCH};

use std::path::PathBuf;
use std::sync::Arc;

/// Registers every built-in tool into `source`, sharing one [`ReadTracker`] across
/// the tools bound by the read-before-write invariant (§4.5, §8 invariant 9).
///
/// Host-facade-backed tools (`lsp`, `codebase_search`, `web_search`) are registered
/// with no facade wired in; callers that have a real facade should register their own
/// instance afterwards via `source.register_sync` (re-registering under the same name
/// replaces the stub).
///
/// `source` must be the same handle the caller intends to share with the agent loop
/// and any MCP adapter: the batch tool dispatches back through it, so registering
/// batch against a different, empty registry would silently break nested tool calls.
pub fn register_builtin_tools(source: &Arc<AggregateToolSource>, working_folder: Arc<PathBuf>) {
    let read_tracker = Arc::new(ReadTracker::new());

    source.register_sync(Arc::new(ReadFileTool::new(
        working_folder.clone(),
        read_tracker.clone(),
    )));
    source.register_sync(Arc::new(EditFileTool::new(
        working_folder.clone(),
        read_tracker.clone(),
    )));
    source.register_sync(Arc::new(MultieditTool::new(
        working_folder.clone(),
        read_tracker.clone(),
    )));
    source.register_sync(Arc::new(ApplyPatchTool::new(
        working_folder.clone(),
        read_tracker.clone(),
    )));
    source.register_sync(Arc::new(ReplaceFileContentTool::new(
        working_folder.clone(),
        read_tracker.clone(),
    )));
    source.register_sync(Arc::new(WriteFileTool::new(working_folder.clone())));
    source.register_sync(Arc::new(GlobTool::new(working_folder.clone())));
    source.register_sync(Arc::new(LsTool::new(working_folder.clone())));
    source.register_sync(Arc::new(CreateFileOrFolderTool::new(working_folder.clone())));
    source.register_sync(Arc::new(DeleteFileOrFolderTool::new(working_folder.clone())));

    source.register_sync(Arc::new(SearchInFileTool::new(working_folder.clone())));
    source.register_sync(Arc::new(SearchFilesTool::new(working_folder.clone())));
    source.register_sync(Arc::new(CodebaseSearchTool::new()));

    source.register_sync(Arc::new(RunCommandTool::new(working_folder.clone())));
    source.register_sync(Arc::new(LspTool::new()));

    source.register_sync(Arc::new(ReadUrlTool::new()));
    source.register_sync(Arc::new(WebSearchTool::new()));

    source.register_sync(Arc::new(CreatePlanTool));
    source.register_sync(Arc::new(UpdatePlanTool));

    source.register_sync(Arc::new(BatchTool::new(source.clone())));
}

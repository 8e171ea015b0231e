//! create_file_or_folder / delete_file_or_folder: a path ending in `/` denotes a folder.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_CREATE_FILE_OR_FOLDER: &str = "create_file_or_folder";
pub const TOOL_DELETE_FILE_OR_FOLDER: &str = "delete_file_or_folder";

/// Creates a file (with optional content) or, when `path` ends in `/`, a folder.
pub struct CreateFileOrFolderTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl CreateFileOrFolderTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for CreateFileOrFolderTool {
    fn name(&self) -> &str {
        TOOL_CREATE_FILE_OR_FOLDER
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_CREATE_FILE_OR_FOLDER.to_string(),
            description: Some(
                "Create a file or folder. Path ending in '/' creates a folder (and any \
                 missing parents); otherwise creates a file (and its parent directories) \
                 with the given content, failing if it already exists."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the working folder. End with '/' for a folder." },
                    "content": { "type": "string", "description": "File content (ignored for folders). Default empty." }
                },
                "required": ["path"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Write,
            parallel_safe: false,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'path'".to_string()))?;
        let is_folder = path_param.ends_with('/');
        let path = resolve_path_under(self.working_folder.as_ref(), path_param.trim_end_matches('/'))?;

        if is_folder {
            std::fs::create_dir_all(&path)
                .map_err(|e| ToolSourceError::Transport(format!("failed to create folder: {}", e)))?;
            return Ok(ToolCallContent {
                text: format!("Created folder {}", path.display()),
            });
        }

        if path.exists() {
            return Err(ToolSourceError::InvalidInput(format!(
                "already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolSourceError::Transport(format!("failed to create parent directories: {}", e)))?;
        }
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        std::fs::write(&path, content)
            .map_err(|e| ToolSourceError::Transport(format!("failed to write file: {}", e)))?;

        Ok(ToolCallContent {
            text: format!("Created file {}", path.display()),
        })
    }
}

/// Deletes a file or, when `path` ends in `/`, a folder (recursively).
pub struct DeleteFileOrFolderTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl DeleteFileOrFolderTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for DeleteFileOrFolderTool {
    fn name(&self) -> &str {
        TOOL_DELETE_FILE_OR_FOLDER
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_DELETE_FILE_OR_FOLDER.to_string(),
            description: Some(
                "Delete a file or folder. Path ending in '/' deletes a folder recursively; \
                 otherwise deletes a single file. Refuses to delete the working folder itself."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path relative to the working folder. End with '/' for a folder." }
                },
                "required": ["path"]
            }),
            approval_type: crate::tool_source::ApprovalType::Dangerous,
            category: crate::tool_source::ToolCategory::Delete,
            parallel_safe: false,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'path'".to_string()))?;
        let is_folder = path_param.ends_with('/');
        let trimmed = path_param.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ToolSourceError::PermissionDenied(
                "refusing to delete the working folder itself".to_string(),
            ));
        }
        let path = resolve_path_under(self.working_folder.as_ref(), trimmed)?;

        if !path.exists() {
            return Err(ToolSourceError::InvalidInput(format!(
                "path not found: {}",
                path.display()
            )));
        }

        if is_folder || path.is_dir() {
            std::fs::remove_dir_all(&path)
                .map_err(|e| ToolSourceError::Transport(format!("failed to delete folder: {}", e)))?;
            Ok(ToolCallContent {
                text: format!("Deleted folder {}", path.display()),
            })
        } else {
            std::fs::remove_file(&path)
                .map_err(|e| ToolSourceError::Transport(format!("failed to delete file: {}", e)))?;
            Ok(ToolCallContent {
                text: format!("Deleted file {}", path.display()),
            })
        }
    }
}

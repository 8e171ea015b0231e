//! replace_file_content: replace a 1-indexed, inclusive line range with new text.
//!
//! Subject to the same read-before-write invariant as [`crate::tools::file::edit_file`] (§4.5,
//! §8 invariant 9): refuses unless the target path was marked "read" earlier in this session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::read_tracker::ReadTracker;
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_REPLACE_FILE_CONTENT: &str = "replace_file_content";

/// Tool that replaces a 1-indexed inclusive line range with new text.
pub struct ReplaceFileContentTool {
    working_folder: Arc<std::path::PathBuf>,
    read_tracker: Arc<ReadTracker>,
}

impl ReplaceFileContentTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>, read_tracker: Arc<ReadTracker>) -> Self {
        Self {
            working_folder,
            read_tracker,
        }
    }
}

#[async_trait]
impl Tool for ReplaceFileContentTool {
    fn name(&self) -> &str {
        TOOL_REPLACE_FILE_CONTENT
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_REPLACE_FILE_CONTENT.to_string(),
            description: Some(
                "Replace a 1-indexed, inclusive line range [startLine, endLine] with new \
                 content. Requires the file to have been read first in this conversation."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path, relative to the working folder." },
                    "startLine": { "type": "integer", "description": "1-indexed first line to replace (inclusive).", "minimum": 1 },
                    "endLine": { "type": "integer", "description": "1-indexed last line to replace (inclusive).", "minimum": 1 },
                    "content": { "type": "string", "description": "Replacement text for the range." }
                },
                "required": ["path", "startLine", "endLine", "content"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Write,
            parallel_safe: false,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'path'".to_string()))?;
        let path = resolve_path_under(self.working_folder.as_ref(), path_param)?;

        let thread_id = ctx.and_then(|c| c.thread_id.as_deref());
        if !self.read_tracker.was_read(thread_id, &path) {
            return Err(ToolSourceError::PermissionDenied(format!(
                "{} must be read before it can be edited",
                path.display()
            )));
        }

        let start_line = args
            .get("startLine")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'startLine'".to_string()))?
            as usize;
        let end_line = args
            .get("endLine")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'endLine'".to_string()))?
            as usize;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'content'".to_string()))?;

        if start_line == 0 || end_line == 0 || end_line < start_line {
            return Err(ToolSourceError::InvalidInput(
                "startLine/endLine are 1-indexed and must satisfy startLine <= endLine".to_string(),
            ));
        }

        let existing = std::fs::read_to_string(&path)
            .map_err(|e| ToolSourceError::Transport(format!("failed to read file: {}", e)))?;
        let mut lines: Vec<&str> = existing.split('\n').collect();
        if end_line > lines.len() {
            return Err(ToolSourceError::InvalidInput(format!(
                "endLine {} exceeds file length {}",
                end_line,
                lines.len()
            )));
        }

        let replacement: Vec<&str> = content.split('\n').collect();
        let removed = end_line - start_line + 1;
        lines.splice(start_line - 1..end_line, replacement.iter().copied());
        let new_content = lines.join("\n");

        std::fs::write(&path, &new_content)
            .map_err(|e| ToolSourceError::Transport(format!("failed to write file: {}", e)))?;

        Ok(ToolCallContent {
            text: format!(
                "Replaced lines {}-{} ({} line(s)) with {} line(s) in {}",
                start_line,
                end_line,
                removed,
                replacement.len(),
                path.display()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replace_requires_prior_read() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let tracker = Arc::new(ReadTracker::new());
        let tool = ReplaceFileContentTool::new(Arc::new(dir.path().to_path_buf()), tracker);
        let err = tool
            .call(
                json!({"path": "a.txt", "startLine": 2, "endLine": 2, "content": "TWO"}),
                None,
            )
            .await;
        assert!(matches!(err, Err(ToolSourceError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn replace_middle_range_after_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let tracker = Arc::new(ReadTracker::new());
        tracker.mark_read(None, &path);
        let tool = ReplaceFileContentTool::new(Arc::new(dir.path().to_path_buf()), tracker);
        tool.call(
            json!({"path": "a.txt", "startLine": 2, "endLine": 2, "content": "TWO"}),
            None,
        )
        .await
        .unwrap();
        let updated = std::fs::read_to_string(&path).unwrap();
        assert_eq!(updated, "one\nTWO\nthree\n");
    }
}

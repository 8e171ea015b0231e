//! Single search/replace edit tool, and the `replace` primitive [`super::apply_patch`]
//! and [`super::multiedit`] build on.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::read_tracker::ReadTracker;
use crate::tools::Tool;

use super::path::resolve_path_under;

pub const TOOL_EDIT_FILE: &str = "edit";

/// Replaces `old` with `new` in `content`.
///
/// When `replace_all` is false, `old` must occur exactly once (ambiguous or missing
/// matches are both errors — silently editing the wrong occurrence is worse than
/// failing the call and letting the model retry with more context in `old`).
pub fn replace(content: &str, old: &str, new: &str, replace_all: bool) -> Result<String, String> {
    if old.is_empty() {
        return Err("oldString must not be empty".to_string());
    }

    let count = content.matches(old).count();
    if count == 0 {
        return Err("oldString not found in file".to_string());
    }

    if replace_all {
        Ok(content.replace(old, new))
    } else {
        if count > 1 {
            return Err(format!(
                "oldString matches {} locations; provide more context to disambiguate, or pass replaceAll",
                count
            ));
        }
        Ok(content.replacen(old, new, 1))
    }
}

/// Tool that applies one search/replace edit to an existing file.
pub struct EditFileTool {
    working_folder: Arc<std::path::PathBuf>,
    read_tracker: Arc<ReadTracker>,
}

impl EditFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>, read_tracker: Arc<ReadTracker>) -> Self {
        Self {
            working_folder,
            read_tracker,
        }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        TOOL_EDIT_FILE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_EDIT_FILE.to_string(),
            description: Some(
                "Replace an exact string in a file. Requires the file to have been read first \
                 in this conversation. Fails if oldString is not found or (without replaceAll) matches \
                 more than once."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path, relative to the working folder." },
                    "oldString": { "type": "string", "description": "Exact text to replace." },
                    "newString": { "type": "string", "description": "Replacement text." },
                    "replaceAll": { "type": "boolean", "description": "Replace every occurrence instead of requiring exactly one. Default false." }
                },
                "required": ["path", "oldString", "newString"]
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
        let old_s = args
            .get("oldString")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'oldString'".to_string()))?;
        let new_s = args
            .get("newString")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'newString'".to_string()))?;
        let replace_all = args
            .get("replaceAll")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let path = resolve_path_under(self.working_folder.as_ref(), path_param)?;
        if !path.is_file() {
            return Err(ToolSourceError::InvalidInput(format!(
                "not a file: {}",
                path_param
            )));
        }

        let thread_id = ctx.and_then(|c| c.thread_id.as_deref());
        if !self.read_tracker.was_read(thread_id, &path) {
            return Err(ToolSourceError::InvalidInput(format!(
                "{} must be read with the read tool before it can be edited",
                path_param
            )));
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ToolSourceError::Internal(format!("reading {}: {}", path_param, e)))?;
        let updated = replace(&content, old_s, new_s, replace_all).map_err(ToolSourceError::InvalidInput)?;
        std::fs::write(&path, &updated)
            .map_err(|e| ToolSourceError::Internal(format!("writing {}: {}", path_param, e)))?;

        Ok(ToolCallContent {
            text: format!("Edited {}", path_param),
        })
    }
}

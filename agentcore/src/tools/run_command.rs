//! run_command: execute a shell command under the working folder, terminal-approval class.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_RUN_COMMAND: &str = "run_command";

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Runs a shell command (`sh -c`) with a cwd under the working folder and a timeout.
///
/// `approvalType: terminal` — the dispatcher will not run this without either an
/// explicit approval or the thread's auto-approve policy covering terminal commands.
pub struct RunCommandTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl RunCommandTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        TOOL_RUN_COMMAND
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_RUN_COMMAND.to_string(),
            description: Some(
                "Run a shell command. Requires user approval unless auto-approve is \
                 enabled for terminal commands. Output is truncated past a size limit."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command line to execute." },
                    "cwd": { "type": "string", "description": "Working directory, relative to the working folder. Default '.'." },
                    "timeout": { "type": "integer", "description": "Timeout in seconds (default 120).", "minimum": 1 }
                },
                "required": ["command"]
            }),
            approval_type: crate::tool_source::ApprovalType::Terminal,
            category: crate::tool_source::ToolCategory::Exec,
            parallel_safe: false,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'command'".to_string()))?;
        let cwd_param = args.get("cwd").and_then(|v| v.as_str()).unwrap_or(".");
        let cwd = crate::tools::file::path::resolve_path_under(self.working_folder.as_ref(), cwd_param)?;
        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolSourceError::Transport(format!("failed to spawn command: {}", e)))?;

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await;

        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolSourceError::Transport(format!("command failed: {}", e)));
            }
            Err(_) => {
                return Err(ToolSourceError::Timeout(format!(
                    "command exceeded {}s timeout",
                    timeout_secs
                )));
            }
        };

        let mut text = String::new();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            text.push_str("\n--- stderr ---\n");
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            text.push_str(&format!(
                "\n--- exit status: {} ---",
                output.status.code().unwrap_or(-1)
            ));
        }
        if text.len() > MAX_OUTPUT_CHARS {
            let head = &text[..MAX_OUTPUT_CHARS / 2];
            let tail = &text[text.len() - MAX_OUTPUT_CHARS / 2..];
            text = format!("{}\n... (truncated) ...\n{}", head, tail);
        }

        Ok(ToolCallContent { text })
    }
}

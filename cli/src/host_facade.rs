//! File-backed [`HostFacade`]: the CLI's only real host integration, used by
//! the agent loop's auto-fix step (and available to the `lsp` tool). `rust-analyzer`
//! or another real language server is a separate host concern; this facade gets its
//! diagnostics from `cargo check --message-format=json` and otherwise reports
//! "not available" honestly rather than fabricating an answer.

use std::path::PathBuf;
use std::process::Command;

use agentcore::tools::lsp::{DocumentSymbol, FileLocation, HostFacade, LintDiagnostic};
use async_trait::async_trait;
use lsp_types::Position;
use serde::Deserialize;

pub struct CargoCheckHostFacade {
    working_folder: PathBuf,
}

impl CargoCheckHostFacade {
    pub fn new(working_folder: PathBuf) -> Self {
        Self { working_folder }
    }
}

#[derive(Debug, Deserialize)]
struct CargoMessage {
    reason: String,
    message: Option<CompilerMessage>,
}

#[derive(Debug, Deserialize)]
struct CompilerMessage {
    level: String,
    message: String,
    spans: Vec<CompilerSpan>,
}

#[derive(Debug, Deserialize)]
struct CompilerSpan {
    file_name: String,
    line_start: u32,
    column_start: u32,
}

fn run_cargo_check(working_folder: &PathBuf) -> Result<Vec<LintDiagnostic>, String> {
    let output = Command::new("cargo")
        .args(["check", "--message-format=json"])
        .current_dir(working_folder)
        .output()
        .map_err(|e| format!("failed to spawn cargo check: {e}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut diagnostics = Vec::new();
    for line in stdout.lines() {
        let parsed: CargoMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if parsed.reason != "compiler-message" {
            continue;
        }
        let Some(message) = parsed.message else { continue };
        let Some(span) = message.spans.first() else { continue };
        diagnostics.push(LintDiagnostic {
            path: span.file_name.clone(),
            line: span.line_start,
            character: span.column_start,
            severity: message.level.clone(),
            message: message.message.clone(),
        });
    }
    Ok(diagnostics)
}

#[async_trait]
impl HostFacade for CargoCheckHostFacade {
    async fn find_references(&self, _path: &str, _position: Position) -> Result<Vec<FileLocation>, String> {
        Err("find_references requires a running language server; this facade only runs cargo check".to_string())
    }

    async fn go_to_definition(&self, _path: &str, _position: Position) -> Result<Vec<FileLocation>, String> {
        Err("go_to_definition requires a running language server; this facade only runs cargo check".to_string())
    }

    async fn get_hover_info(&self, _path: &str, _position: Position) -> Result<Option<String>, String> {
        Ok(None)
    }

    async fn get_document_symbols(&self, _path: &str) -> Result<Vec<DocumentSymbol>, String> {
        Ok(Vec::new())
    }

    async fn get_lint_errors(&self, path: Option<&str>) -> Result<Vec<LintDiagnostic>, String> {
        let working_folder = self.working_folder.clone();
        let diagnostics = tokio::task::spawn_blocking(move || run_cargo_check(&working_folder))
            .await
            .map_err(|e| format!("cargo check task panicked: {e}"))??;
        match path {
            Some(p) => Ok(diagnostics.into_iter().filter(|d| d.path.ends_with(p)).collect()),
            None => Ok(diagnostics),
        }
    }
}

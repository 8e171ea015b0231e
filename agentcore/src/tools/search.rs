//! Text search tools: `search_in_file`, `search_files`, and `codebase_search`.
//!
//! `search_in_file`/`search_files` are backed by the ripgrep library stack
//! (`grep-regex` + `grep-searcher` + `ignore`), matching how the corpus's own
//! grep-style tools are built on those crates rather than a hand-rolled scanner.
//! `codebase_search` is semantic search; this core does not implement a vector
//! index (Non-goal, §1) and instead invokes an opaque [`SemanticSearchFacade`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::Searcher;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::file::path::resolve_path_under;

pub const TOOL_SEARCH_IN_FILE: &str = "search_in_file";
pub const TOOL_SEARCH_FILES: &str = "search_files";
pub const TOOL_CODEBASE_SEARCH: &str = "codebase_search";

const MAX_MATCHES: usize = 200;

/// One text match within a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMatch {
    pub path: String,
    pub line: u64,
    pub text: String,
}

fn run_search(root: &Path, pattern: &str, include: Option<&str>) -> Result<Vec<TextMatch>, ToolSourceError> {
    let matcher = RegexMatcher::new(pattern)
        .map_err(|e| ToolSourceError::InvalidInput(format!("invalid regex: {}", e)))?;
    let include_glob = include
        .map(|p| glob::Pattern::new(p))
        .transpose()
        .map_err(|e| ToolSourceError::InvalidInput(format!("invalid include glob: {}", e)))?;

    let mut matches = Vec::new();
    'walk: for entry in WalkBuilder::new(root).hidden(false).build() {
        let entry = entry.map_err(|e| ToolSourceError::Transport(format!("walk error: {}", e)))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(glob) = &include_glob {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if !glob.matches_path(rel) {
                continue;
            }
        }
        let path = entry.path().to_path_buf();
        let mut searcher = Searcher::new();
        let search_result = searcher.search_path(
            &matcher,
            &path,
            UTF8(|lnum, line| {
                matches.push(TextMatch {
                    path: path.display().to_string(),
                    line: lnum,
                    text: line.trim_end().to_string(),
                });
                Ok(matches.len() < MAX_MATCHES)
            }),
        );
        if search_result.is_err() {
            // binary file or unreadable; skip it rather than failing the whole search
            continue;
        }
        if matches.len() >= MAX_MATCHES {
            break 'walk;
        }
    }
    Ok(matches)
}

fn render_matches(matches: &[TextMatch]) -> String {
    if matches.is_empty() {
        return "(no matches)".to_string();
    }
    let mut out = matches
        .iter()
        .map(|m| format!("{}:{}: {}", m.path, m.line, m.text))
        .collect::<Vec<_>>()
        .join("\n");
    if matches.len() >= MAX_MATCHES {
        out.push_str(&format!("\n... (truncated at {} matches)", MAX_MATCHES));
    }
    out
}

/// Searches a single file for a regex pattern.
pub struct SearchInFileTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl SearchInFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for SearchInFileTool {
    fn name(&self) -> &str {
        TOOL_SEARCH_IN_FILE
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_SEARCH_IN_FILE.to_string(),
            description: Some("Search for a regex pattern within one file.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to the working folder." },
                    "pattern": { "type": "string", "description": "Regex pattern to search for." }
                },
                "required": ["path", "pattern"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Search,
            parallel_safe: true,
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
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'pattern'".to_string()))?;
        let path = resolve_path_under(self.working_folder.as_ref(), path_param)?;

        let matcher = RegexMatcher::new(pattern)
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid regex: {}", e)))?;
        let mut matches = Vec::new();
        let mut searcher = Searcher::new();
        searcher
            .search_path(
                &matcher,
                &path,
                UTF8(|lnum, line| {
                    matches.push(TextMatch {
                        path: path.display().to_string(),
                        line: lnum,
                        text: line.trim_end().to_string(),
                    });
                    Ok(matches.len() < MAX_MATCHES)
                }),
            )
            .map_err(|e| ToolSourceError::Transport(format!("failed to search file: {}", e)))?;

        Ok(ToolCallContent {
            text: render_matches(&matches),
        })
    }
}

/// Searches recursively under the working folder (or a subdirectory) for a regex pattern.
pub struct SearchFilesTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl SearchFilesTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        TOOL_SEARCH_FILES
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_SEARCH_FILES.to_string(),
            description: Some(
                "Search for a regex pattern across files under the working folder. \
                 Respects .gitignore. Optional 'path' restricts the search to a \
                 subdirectory; optional 'include' filters by glob (e.g. '*.rs')."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regex pattern to search for." },
                    "path": { "type": "string", "description": "Subdirectory to search, relative to the working folder. Default '.'." },
                    "include": { "type": "string", "description": "Glob filter applied to matched file paths, e.g. '*.rs'." }
                },
                "required": ["pattern"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Search,
            parallel_safe: true,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'pattern'".to_string()))?;
        let path_param = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let include = args.get("include").and_then(|v| v.as_str());
        let root = resolve_path_under(self.working_folder.as_ref(), path_param)?;

        let matches = run_search(&root, pattern, include)?;
        Ok(ToolCallContent {
            text: render_matches(&matches),
        })
    }
}

/// Host-provided bridge to a semantic/vector search index. This core invokes the
/// facade but never implements the index itself (Non-goal, §1).
#[async_trait]
pub trait SemanticSearchFacade: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SemanticMatch>, String>;
}

/// One result from a semantic/vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub relative_path: String,
    pub content: String,
    pub language: Option<String>,
    pub start_line: u32,
    pub score: f32,
}

/// `codebase_search`: natural-language search over the workspace via an opaque
/// semantic-search facade. Without one configured, returns an honest stub result.
pub struct CodebaseSearchTool {
    facade: Option<Arc<dyn SemanticSearchFacade>>,
}

impl CodebaseSearchTool {
    pub fn new() -> Self {
        Self { facade: None }
    }

    pub fn with_facade(facade: Arc<dyn SemanticSearchFacade>) -> Self {
        Self { facade: Some(facade) }
    }
}

impl Default for CodebaseSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

const SEMANTIC_NOT_AVAILABLE: &str =
    "No semantic search index is configured for this workspace; falling back is not automatic, use search_files instead.";

#[async_trait]
impl Tool for CodebaseSearchTool {
    fn name(&self) -> &str {
        TOOL_CODEBASE_SEARCH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_CODEBASE_SEARCH.to_string(),
            description: Some(
                "Natural-language semantic search over the codebase. Prefer this over \
                 search_files when you don't know the exact text to match."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Natural-language description of what to find." },
                    "topK": { "type": "integer", "description": "Max results (default 10).", "minimum": 1, "default": 10 }
                },
                "required": ["query"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Search,
            parallel_safe: true,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'query'".to_string()))?;
        let top_k = args.get("topK").and_then(|v| v.as_u64()).unwrap_or(10) as usize;

        let Some(facade) = &self.facade else {
            return Ok(ToolCallContent {
                text: SEMANTIC_NOT_AVAILABLE.to_string(),
            });
        };

        let results = facade
            .search(query, top_k)
            .await
            .map_err(ToolSourceError::Internal)?;

        if results.is_empty() {
            return Ok(ToolCallContent {
                text: "(no matches)".to_string(),
            });
        }

        let text = results
            .iter()
            .map(|r| {
                format!(
                    "{}:{} (score {:.2})\n{}",
                    r.relative_path, r.start_line, r.score, r.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(ToolCallContent { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn search_in_file_finds_matching_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn foo() {}\nfn bar() {}\n").unwrap();
        let tool = SearchInFileTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool
            .call(json!({"path": "a.rs", "pattern": "fn bar"}), None)
            .await
            .unwrap();
        assert!(out.text.contains("fn bar"));
        assert!(!out.text.contains("fn foo"));
    }

    #[tokio::test]
    async fn search_files_walks_subdirectories() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "needle here\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "no match\n").unwrap();
        let tool = SearchFilesTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool
            .call(json!({"pattern": "needle"}), None)
            .await
            .unwrap();
        assert!(out.text.contains("needle here"));
    }

    #[tokio::test]
    async fn search_files_respects_include_glob() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "needle\n").unwrap();
        let tool = SearchFilesTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool
            .call(json!({"pattern": "needle", "include": "*.rs"}), None)
            .await
            .unwrap();
        assert!(out.text.contains("a.rs"));
        assert!(!out.text.contains("a.txt"));
    }

    #[tokio::test]
    async fn codebase_search_without_facade_returns_stub() {
        let tool = CodebaseSearchTool::new();
        let out = tool.call(json!({"query": "auth logic"}), None).await.unwrap();
        assert_eq!(out.text, SEMANTIC_NOT_AVAILABLE);
    }

    struct FixedFacade;

    #[async_trait]
    impl SemanticSearchFacade for FixedFacade {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SemanticMatch>, String> {
            Ok(vec![SemanticMatch {
                relative_path: "src/auth.rs".to_string(),
                content: "fn authenticate() {}".to_string(),
                language: Some("rust".to_string()),
                start_line: 10,
                score: 0.92,
            }])
        }
    }

    #[tokio::test]
    async fn codebase_search_with_facade_renders_results() {
        let tool = CodebaseSearchTool::with_facade(Arc::new(FixedFacade));
        let out = tool.call(json!({"query": "auth logic"}), None).await.unwrap();
        assert!(out.text.contains("src/auth.rs"));
    }
}

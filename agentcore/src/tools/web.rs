//! `read_url` / `web_search`: net-class tools backed by `reqwest`.
//!
//! Real web search requires a provider API key (Exa/Tavily/Bing/etc.); rather than
//! hard-coding one vendor, `web_search` dispatches through an opaque
//! [`WebSearchProvider`] the host wires in, matching the host-facade pattern used
//! by [`crate::tools::lsp`] for language-server queries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

pub const TOOL_READ_URL: &str = "read_url";
pub const TOOL_WEB_SEARCH: &str = "web_search";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const MAX_CONTENT_CHARS: usize = 20_000;

/// Fetches a URL and returns its title (best-effort) and text content.
pub struct ReadUrlTool {
    client: reqwest::Client,
}

impl ReadUrlTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for ReadUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = lower[start..].find("</title>")? + start;
    Some(html[start..end].trim().to_string())
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Tool for ReadUrlTool {
    fn name(&self) -> &str {
        TOOL_READ_URL
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_READ_URL.to_string(),
            description: Some("Fetch a URL and return its title and text content.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute URL to fetch." },
                    "timeout": { "type": "integer", "description": "Timeout in seconds (default 20).", "minimum": 1 }
                },
                "required": ["url"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Net,
            parallel_safe: true,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing 'url'".to_string()))?;
        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ToolSourceError::Transport(format!(
                "fetch returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("failed to read response body: {}", e)))?;

        let title = extract_title(&body).unwrap_or_else(|| url.to_string());
        let mut content = strip_tags(&body);
        if content.len() > MAX_CONTENT_CHARS {
            content.truncate(MAX_CONTENT_CHARS);
            content.push_str("... (truncated)");
        }

        Ok(ToolCallContent {
            text: format!("# {}\n\n{}", title, content),
        })
    }
}

/// One web search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Host-provided bridge to a web search API (Exa/Tavily/Bing/etc.).
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebSearchResult>, String>;
}

/// `web_search`: dispatches to an optional [`WebSearchProvider`]; without one
/// configured, returns an honest "not available" result.
pub struct WebSearchTool {
    provider: Option<Arc<dyn WebSearchProvider>>,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self { provider: None }
    }

    pub fn with_provider(provider: Arc<dyn WebSearchProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

const SEARCH_NOT_AVAILABLE: &str = "No web search provider is configured.";

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_WEB_SEARCH
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_WEB_SEARCH.to_string(),
            description: Some("Search the web and return titles, URLs, and snippets.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query." },
                    "maxResults": { "type": "integer", "description": "Max results (default 5).", "minimum": 1, "default": 5 }
                },
                "required": ["query"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Net,
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
        let max_results = args.get("maxResults").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let Some(provider) = &self.provider else {
            return Ok(ToolCallContent {
                text: SEARCH_NOT_AVAILABLE.to_string(),
            });
        };

        let results = provider
            .search(query, max_results)
            .await
            .map_err(ToolSourceError::Internal)?;

        if results.is_empty() {
            return Ok(ToolCallContent {
                text: "(no results)".to_string(),
            });
        }

        let text = results
            .iter()
            .map(|r| format!("{} — {}\n{}", r.title, r.url, r.content))
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(ToolCallContent { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_case_insensitively() {
        let html = "<html><HEAD><TITLE> Example </TITLE></head><body>hi</body></html>";
        assert_eq!(extract_title(html), Some("Example".to_string()));
    }

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<p>Hello   <b>World</b></p>";
        assert_eq!(strip_tags(html), "Hello World");
    }

    #[tokio::test]
    async fn web_search_without_provider_returns_stub() {
        let tool = WebSearchTool::new();
        let out = tool
            .call(json!({"query": "rust async traits"}), None)
            .await
            .unwrap();
        assert_eq!(out.text, SEARCH_NOT_AVAILABLE);
    }

    struct FixedProvider;

    #[async_trait]
    impl WebSearchProvider for FixedProvider {
        async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<WebSearchResult>, String> {
            Ok(vec![WebSearchResult {
                title: "Rust".to_string(),
                url: "https://rust-lang.org".to_string(),
                content: "A language empowering everyone.".to_string(),
            }])
        }
    }

    #[tokio::test]
    async fn web_search_with_provider_renders_results() {
        let tool = WebSearchTool::with_provider(Arc::new(FixedProvider));
        let out = tool.call(json!({"query": "rust"}), None).await.unwrap();
        assert!(out.text.contains("rust-lang.org"));
    }
}

//! Multi-server MCP manager: declarative server config, lazy connection, tool
//! name disambiguation, and the `needs_auth` sticky state for remote servers.
//!
//! A single `McpToolSource` (see `super`) speaks to exactly one server. Real
//! deployments declare several (filesystem, GitHub, Exa, ...); `McpManager`
//! holds the declared [`McpServerConfig`]s, connects each lazily on first use
//! (never at startup, never for a `disabled` server), and exposes every
//! server's tools behind one `mcp_<serverId>_<toolName>` namespace so the LLM
//! can disambiguate a `search` tool that two different servers both expose.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tool_source::{ToolCallContent, ToolSource, ToolSourceError, ToolSpec};

use super::McpToolSource;

/// OAuth2 parameters for a remote server, as declared in config (§6).
/// `client_id`/`client_secret` may be absent when dynamic client registration
/// is expected to supply them; kept opaque here since the registration dance
/// itself is host-facing (a browser round-trip), not something this core drives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpOAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// A local (stdio, spawned child process) MCP server declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMcpServerConfig {
    pub id: String,
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub disabled: bool,
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub auto_approve: Vec<String>,
}

/// A remote (Streamable HTTP, optionally SSE-fallback) MCP server declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMcpServerConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub oauth: Option<McpOAuthConfig>,
    #[serde(default)]
    pub disabled: bool,
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub auto_approve: Vec<String>,
}

/// One declared MCP server, local or remote (§6 "MCP server config").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServerConfig {
    Local(LocalMcpServerConfig),
    Remote(RemoteMcpServerConfig),
}

impl McpServerConfig {
    pub fn id(&self) -> &str {
        match self {
            McpServerConfig::Local(c) => &c.id,
            McpServerConfig::Remote(c) => &c.id,
        }
    }

    pub fn disabled(&self) -> bool {
        match self {
            McpServerConfig::Local(c) => c.disabled,
            McpServerConfig::Remote(c) => c.disabled,
        }
    }

    pub fn auto_approve(&self) -> &[String] {
        match self {
            McpServerConfig::Local(c) => &c.auto_approve,
            McpServerConfig::Remote(c) => &c.auto_approve,
        }
    }
}

/// Connection status of one declared server (§4.6, §7 "MCP transport").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpServerStatus {
    /// Declared but never connected (the default; connection is lazy).
    Disconnected,
    Connected,
    /// Sticky until `finish_auth` succeeds: the transport reported Unauthorized.
    NeedsAuth { auth_url: String },
    /// Sticky until the next explicit reconnect attempt: both StreamableHTTP
    /// and SSE fell through (remote) or spawn/initialize failed (local).
    Error { message: String },
    Disabled,
}

/// Holds every declared MCP server and lazily-created sessions for the ones
/// actually used. One manager per process (or per workspace); thread-safe.
pub struct McpManager {
    configs: RwLock<HashMap<String, McpServerConfig>>,
    sessions: RwLock<HashMap<String, Arc<McpToolSource>>>,
    status: RwLock<HashMap<String, McpServerStatus>>,
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl McpManager {
    pub fn new(configs: Vec<McpServerConfig>) -> Self {
        let mut status = HashMap::new();
        let mut by_id = HashMap::new();
        for cfg in configs {
            status.insert(
                cfg.id().to_string(),
                if cfg.disabled() {
                    McpServerStatus::Disabled
                } else {
                    McpServerStatus::Disconnected
                },
            );
            by_id.insert(cfg.id().to_string(), cfg);
        }
        Self {
            configs: RwLock::new(by_id),
            sessions: RwLock::new(HashMap::new()),
            status: RwLock::new(status),
        }
    }

    /// (Re)loads server definitions, e.g. after a debounced config-file change.
    /// Servers whose config is unchanged keep their existing session; servers no
    /// longer present are dropped; newly-disabled servers are disconnected.
    pub fn reload(&self, configs: Vec<McpServerConfig>) {
        let mut by_id = HashMap::new();
        let mut status = self.status.write().unwrap();
        let mut sessions = self.sessions.write().unwrap();
        status.retain(|id, _| configs.iter().any(|c| c.id() == id));
        sessions.retain(|id, _| configs.iter().any(|c| c.id() == id));
        for cfg in configs {
            let id = cfg.id().to_string();
            if cfg.disabled() {
                sessions.remove(&id);
                status.insert(id.clone(), McpServerStatus::Disabled);
            } else if !status.contains_key(&id) {
                status.insert(id.clone(), McpServerStatus::Disconnected);
            } else if matches!(status.get(&id), Some(McpServerStatus::Disabled)) {
                status.insert(id.clone(), McpServerStatus::Disconnected);
            }
            by_id.insert(id, cfg);
        }
        *self.configs.write().unwrap() = by_id;
    }

    pub fn status(&self, server_id: &str) -> Option<McpServerStatus> {
        self.status.read().unwrap().get(server_id).cloned()
    }

    pub fn server_ids(&self) -> Vec<String> {
        self.configs.read().unwrap().keys().cloned().collect()
    }

    /// Resolves the auth URL for a server stuck in `needs_auth`, completing the
    /// authorization-code exchange. This core does not perform the browser
    /// round-trip or token exchange itself (§1: host-facing concerns are out of
    /// scope); it records the code as a bearer credential and clears the sticky
    /// state so the next call retries the connection with it.
    pub fn finish_auth(&self, server_id: &str, code: &str) -> Result<(), ToolSourceError> {
        let mut configs = self.configs.write().unwrap();
        let cfg = configs
            .get_mut(server_id)
            .ok_or_else(|| ToolSourceError::NotFound(server_id.to_string()))?;
        match cfg {
            McpServerConfig::Remote(r) => {
                r.headers
                    .retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
                r.headers
                    .push(("Authorization".to_string(), format!("Bearer {}", code)));
            }
            McpServerConfig::Local(_) => {
                return Err(ToolSourceError::InvalidInput(
                    "finish_auth only applies to remote servers".into(),
                ));
            }
        }
        drop(configs);
        self.sessions.write().unwrap().remove(server_id);
        self.status
            .write()
            .unwrap()
            .insert(server_id.to_string(), McpServerStatus::Disconnected);
        Ok(())
    }

    /// Connects (or returns the already-connected session for) a server.
    /// Disabled servers are never connected, matching §4.6's manager lifecycle.
    async fn ensure_connected(&self, server_id: &str) -> Result<Arc<McpToolSource>, ToolSourceError> {
        if let Some(existing) = self.sessions.read().unwrap().get(server_id).cloned() {
            return Ok(existing);
        }
        let cfg = self
            .configs
            .read()
            .unwrap()
            .get(server_id)
            .cloned()
            .ok_or_else(|| ToolSourceError::NotFound(server_id.to_string()))?;
        if cfg.disabled() {
            return Err(ToolSourceError::PermissionDenied(format!(
                "mcp server '{}' is disabled",
                server_id
            )));
        }
        let connect_result = match &cfg {
            McpServerConfig::Local(c) => McpToolSource::new_with_env(
                c.command.clone(),
                c.args.clone(),
                c.env.clone(),
                false,
            )
            .map_err(|e| ToolSourceError::Transport(e.to_string())),
            McpServerConfig::Remote(c) => {
                McpToolSource::new_http(c.url.clone(), c.headers.clone()).await
            }
        };
        match connect_result {
            Ok(session) => {
                let arc = Arc::new(session);
                self.sessions
                    .write()
                    .unwrap()
                    .insert(server_id.to_string(), Arc::clone(&arc));
                self.status
                    .write()
                    .unwrap()
                    .insert(server_id.to_string(), McpServerStatus::Connected);
                Ok(arc)
            }
            Err(e) => {
                let message = e.to_string();
                let is_unauthorized = message.contains("401") || message.contains("Unauthorized");
                let new_status = if is_unauthorized {
                    if let McpServerConfig::Remote(c) = &cfg {
                        McpServerStatus::NeedsAuth {
                            auth_url: c.url.clone(),
                        }
                    } else {
                        McpServerStatus::Error { message: message.clone() }
                    }
                } else {
                    McpServerStatus::Error {
                        message: message.clone(),
                    }
                };
                self.status
                    .write()
                    .unwrap()
                    .insert(server_id.to_string(), new_status);
                Err(e)
            }
        }
    }

    /// Lists tools from every enabled server, prefixed `mcp_<serverId>_<toolName>`.
    /// A server that fails to connect is skipped (its status records the failure);
    /// this never fails the whole listing for the sake of the other servers.
    pub async fn list_tools(&self) -> Vec<ToolSpec> {
        let ids = self.server_ids();
        let mut out = Vec::new();
        for id in ids {
            if matches!(self.status(&id), Some(McpServerStatus::Disabled)) {
                continue;
            }
            let session = match self.ensure_connected(&id).await {
                Ok(s) => s,
                Err(_) => continue,
            };
            let specs = match session.list_tools().await {
                Ok(s) => s,
                Err(_) => continue,
            };
            for mut spec in specs {
                spec.name = format!("mcp_{}_{}", id, spec.name);
                out.push(spec);
            }
        }
        out
    }

    /// Calls a prefixed tool name (`mcp_<serverId>_<toolName>`), routing to the
    /// owning server. Returns `NotFound` if no declared server id is a valid
    /// prefix (server ids may themselves contain underscores, so this matches
    /// against the longest declared id that prefixes the name).
    pub async fn call_tool(
        &self,
        prefixed_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let rest = prefixed_name
            .strip_prefix("mcp_")
            .ok_or_else(|| ToolSourceError::NotFound(prefixed_name.to_string()))?;
        let ids = self.server_ids();
        let (server_id, tool_name) = ids
            .iter()
            .filter_map(|id| {
                rest.strip_prefix(id.as_str())
                    .and_then(|tail| tail.strip_prefix('_'))
                    .map(|tool_name| (id.clone(), tool_name.to_string()))
            })
            .max_by_key(|(id, _)| id.len())
            .ok_or_else(|| ToolSourceError::NotFound(prefixed_name.to_string()))?;
        let session = self.ensure_connected(&server_id).await?;
        session.call_tool(&tool_name, arguments).await
    }
}

/// Raw shape of one entry under `mcpServers` in an MCP config file, covering
/// both local and remote fields; converted to [`McpServerConfig`] with the map
/// key as `id` (and as `name` unless the entry overrides it).
#[derive(Debug, Deserialize)]
struct RawMcpServerEntry {
    name: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    oauth: Option<McpOAuthConfig>,
    #[serde(default)]
    disabled: bool,
    timeout_secs: Option<u64>,
    #[serde(default, rename = "autoApprove")]
    auto_approve: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct McpConfigFile {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: HashMap<String, RawMcpServerEntry>,
}

impl McpManager {
    /// Parses an MCP config file (the common `{"mcpServers": {id: {...}}}` shape,
    /// per §6's local/remote server config) into declared servers. An entry with
    /// a `command` field is local; one with a `url` field is remote.
    pub fn parse_config(contents: &str) -> Result<Vec<McpServerConfig>, ToolSourceError> {
        let file: McpConfigFile = serde_json::from_str(contents)
            .map_err(|e| ToolSourceError::InvalidInput(format!("mcp config: {}", e)))?;
        let mut out = Vec::with_capacity(file.mcp_servers.len());
        for (id, entry) in file.mcp_servers {
            let name = entry.name.clone().unwrap_or_else(|| id.clone());
            if let Some(command) = entry.command {
                out.push(McpServerConfig::Local(LocalMcpServerConfig {
                    id,
                    name,
                    command,
                    args: entry.args,
                    env: entry.env.into_iter().collect(),
                    disabled: entry.disabled,
                    timeout: entry.timeout_secs.map(Duration::from_secs),
                    auto_approve: entry.auto_approve,
                }));
            } else if let Some(url) = entry.url {
                out.push(McpServerConfig::Remote(RemoteMcpServerConfig {
                    id,
                    name,
                    url,
                    headers: entry.headers.into_iter().collect(),
                    oauth: entry.oauth,
                    disabled: entry.disabled,
                    timeout: entry.timeout_secs.map(Duration::from_secs),
                    auto_approve: entry.auto_approve,
                }));
            } else {
                return Err(ToolSourceError::InvalidInput(format!(
                    "mcp server '{}' has neither 'command' nor 'url'",
                    id
                )));
            }
        }
        Ok(out)
    }

    /// Loads and applies a config file by path; see [`Self::parse_config`].
    pub fn load_config_file(&self, path: &std::path::Path) -> Result<(), ToolSourceError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ToolSourceError::InvalidInput(format!("read {}: {}", path.display(), e)))?;
        let configs = Self::parse_config(&contents)?;
        self.reload(configs);
        Ok(())
    }

    /// Polls `path`'s mtime and, on change, waits out a 500 ms debounce window
    /// (coalescing a burst of writes into one reload) before re-reading it.
    /// Runs until the returned handle is aborted; failures to parse or read the
    /// file are logged and leave the previous configuration in place.
    pub fn watch_config_file(self: Arc<Self>, path: std::path::PathBuf) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let debounce = Duration::from_millis(500);
            let mut poll = tokio::time::interval(Duration::from_millis(250));
            let mut last_modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
            loop {
                poll.tick().await;
                let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if Some(modified) == last_modified {
                    continue;
                }
                tokio::time::sleep(debounce).await;
                let settled = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
                if settled != Some(modified) {
                    // still changing; pick it up on a later tick instead of racing a write
                    continue;
                }
                last_modified = Some(modified);
                if let Err(e) = self.load_config_file(&path) {
                    tracing::warn!(error = %e, path = %path.display(), "mcp config reload failed");
                }
            }
        })
    }
}

/// Adapts an `McpManager` behind the single-server `ToolSource` contract, so it
/// can be registered wholesale the same way a lone `McpToolSource` would be.
#[async_trait]
impl ToolSource for McpManager {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(McpManager::list_tools(self).await)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        McpManager::call_tool(self, name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: &str, disabled: bool) -> McpServerConfig {
        McpServerConfig::Local(LocalMcpServerConfig {
            id: id.to_string(),
            name: id.to_string(),
            command: "_nonexistent_command_xyz_".to_string(),
            args: vec![],
            env: vec![],
            disabled,
            timeout: None,
            auto_approve: vec![],
        })
    }

    #[test]
    fn new_marks_disabled_servers_without_connecting() {
        let manager = McpManager::new(vec![local("a", false), local("b", true)]);
        assert_eq!(manager.status("a"), Some(McpServerStatus::Disconnected));
        assert_eq!(manager.status("b"), Some(McpServerStatus::Disabled));
    }

    #[tokio::test]
    async fn list_tools_skips_servers_that_fail_to_connect() {
        let manager = McpManager::new(vec![local("broken", false)]);
        let tools = manager.list_tools().await;
        assert!(tools.is_empty());
        assert!(matches!(
            manager.status("broken"),
            Some(McpServerStatus::Error { .. })
        ));
    }

    #[tokio::test]
    async fn call_tool_unknown_prefix_returns_not_found() {
        let manager = McpManager::new(vec![local("fs", false)]);
        let err = manager
            .call_tool("mcp_other_read", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn call_tool_disabled_server_returns_permission_denied() {
        let manager = McpManager::new(vec![local("fs", true)]);
        let err = manager
            .call_tool("mcp_fs_read", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::PermissionDenied(_)));
    }

    #[test]
    fn reload_disconnects_removed_and_newly_disabled_servers() {
        let manager = McpManager::new(vec![local("a", false), local("b", false)]);
        manager.reload(vec![local("a", true)]);
        assert_eq!(manager.status("a"), Some(McpServerStatus::Disabled));
        assert_eq!(manager.status("b"), None);
    }

    #[test]
    fn finish_auth_rejects_local_servers() {
        let manager = McpManager::new(vec![local("a", false)]);
        let err = manager.finish_auth("a", "code123").unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[test]
    fn finish_auth_unknown_server_returns_not_found() {
        let manager = McpManager::new(vec![]);
        let err = manager.finish_auth("missing", "code123").unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(_)));
    }

    #[test]
    fn parse_config_distinguishes_local_and_remote_entries() {
        let json = r#"{
            "mcpServers": {
                "filesystem": {"command": "mcp-fs", "args": ["--root", "."]},
                "exa": {"url": "https://mcp.exa.ai/mcp", "headers": {"X-Key": "abc"}, "disabled": true}
            }
        }"#;
        let configs = McpManager::parse_config(json).unwrap();
        assert_eq!(configs.len(), 2);
        let fs = configs.iter().find(|c| c.id() == "filesystem").unwrap();
        assert!(matches!(fs, McpServerConfig::Local(_)));
        assert!(!fs.disabled());
        let exa = configs.iter().find(|c| c.id() == "exa").unwrap();
        assert!(matches!(exa, McpServerConfig::Remote(_)));
        assert!(exa.disabled());
    }

    #[test]
    fn parse_config_rejects_entry_missing_command_and_url() {
        let json = r#"{"mcpServers": {"bad": {"disabled": false}}}"#;
        let err = McpManager::parse_config(json).unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[test]
    fn load_config_file_reloads_manager_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        std::fs::write(
            &path,
            r#"{"mcpServers": {"fs": {"command": "mcp-fs"}}}"#,
        )
        .unwrap();
        let manager = McpManager::new(vec![]);
        manager.load_config_file(&path).unwrap();
        assert_eq!(manager.status("fs"), Some(McpServerStatus::Disconnected));
    }
}

//! Declarative description of a custom HTTP provider's wire format (§4.3): the
//! `custom_http` provider is entirely driven by one of these rather than by
//! protocol-specific Rust code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Dotted-path template, e.g. `{{model}}` / `{{messages}}`, interpolated at
    /// request-build time against the unified [`super::ChatRequest`].
    pub body_template: serde_json::Value,
}

fn default_method() -> HttpMethod {
    HttpMethod::Post
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Path within each streamed chunk to the text delta, e.g. `"delta.content"`.
    pub content_field: String,
    #[serde(default)]
    pub tool_call_field: Option<String>,
    #[serde(default)]
    pub tool_name_path: Option<String>,
    #[serde(default)]
    pub tool_args_path: Option<String>,
    #[serde(default)]
    pub tool_id_path: Option<String>,
    #[serde(default)]
    pub reasoning_field: Option<String>,
    #[serde(default = "default_done_marker")]
    pub done_marker: String,
}

fn default_done_marker() -> String {
    "[DONE]".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMessageMode {
    Role,
    Parameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFormatConfig {
    #[serde(default = "default_system_mode")]
    pub system_message_mode: SystemMessageMode,
    #[serde(default)]
    pub system_parameter_name: Option<String>,
}

fn default_system_mode() -> SystemMessageMode {
    SystemMessageMode::Role
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolWrapMode {
    None,
    Function,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFormat {
    #[serde(default = "default_wrap_mode")]
    pub wrap_mode: ToolWrapMode,
    #[serde(default = "default_wrap_field")]
    pub wrap_field: String,
    #[serde(default = "default_parameter_field")]
    pub parameter_field: String,
    #[serde(default)]
    pub include_type: bool,
}

fn default_wrap_mode() -> ToolWrapMode {
    ToolWrapMode::Function
}

fn default_wrap_field() -> String {
    "function".to_string()
}

fn default_parameter_field() -> String {
    "parameters".to_string()
}

impl Default for ToolFormat {
    fn default() -> Self {
        Self {
            wrap_mode: default_wrap_mode(),
            wrap_field: default_wrap_field(),
            parameter_field: default_parameter_field(),
            include_type: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    Bearer,
    Header,
    ApiKey,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub header_name: Option<String>,
}

/// Full custom-HTTP provider config; each section mirrors one piece of §4.3's
/// "Custom HTTP" adaptation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub request: RequestConfig,
    pub response: ResponseConfig,
    #[serde(default = "MessageFormatConfig::default_inline")]
    pub message_format: MessageFormatConfig,
    #[serde(default)]
    pub tool_format: ToolFormat,
    pub auth: AuthConfig,
}

impl MessageFormatConfig {
    fn default_inline() -> Self {
        Self {
            system_message_mode: SystemMessageMode::Role,
            system_parameter_name: None,
        }
    }
}

impl AdapterConfig {
    /// "DashScope-style" envelopes are recognized by an `input` field in the
    /// request body template (§4.3): the body becomes
    /// `{model, input: {messages, [system]}, parameters: {...}}`.
    pub fn is_dashscope_style(&self) -> bool {
        self.request
            .body_template
            .get("input")
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dashscope_style_envelope_from_input_field() {
        let config = AdapterConfig {
            request: RequestConfig {
                endpoint: "https://example.com/v1/chat".to_string(),
                method: HttpMethod::Post,
                headers: HashMap::new(),
                body_template: serde_json::json!({"model": "{{model}}", "input": {}}),
            },
            response: ResponseConfig {
                content_field: "output.text".to_string(),
                tool_call_field: None,
                tool_name_path: None,
                tool_args_path: None,
                tool_id_path: None,
                reasoning_field: None,
                done_marker: "[DONE]".to_string(),
            },
            message_format: MessageFormatConfig::default_inline(),
            tool_format: ToolFormat::default(),
            auth: AuthConfig {
                auth_type: AuthType::Bearer,
                header_name: None,
            },
        };
        assert!(config.is_dashscope_style());
    }
}

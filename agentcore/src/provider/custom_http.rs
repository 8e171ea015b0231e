//! Declarative "custom HTTP" provider (§4.3): no protocol-specific Rust code at
//! all — endpoint, auth, message/tool framing, and the dotted-path response
//! layout are entirely data, carried in an [`AdapterConfig`]. Adding a new
//! self-hosted or vendor-specific OpenAI-shaped endpoint (DashScope and
//! similar) is then a config change, not a new provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use stream_event::{ReasoningPhase, StreamEvent, ToolCall as WireToolCall};

use super::adapter_config::{AdapterConfig, AuthType, HttpMethod, ResponseConfig, SystemMessageMode};
use super::message_adapter::{MessageAdapter, Protocol};
use super::tool_adapter::ToolAdapter;
use super::{sse, ChatRequest, EventStream, Provider, ProviderError};

pub struct CustomHttpProvider {
    client: reqwest::Client,
    config: AdapterConfig,
    api_key: String,
}

impl CustomHttpProvider {
    pub fn new(config: AdapterConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, request: &ChatRequest) -> String {
        self.config.request.endpoint.replace("{{model}}", &request.model)
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let message_adapter = MessageAdapter::new(Protocol::Custom);
        let (messages, system) = match self.config.message_format.system_message_mode {
            SystemMessageMode::Role => (
                message_adapter.to_openai(&request.messages, request.system_prompt.as_deref()),
                None,
            ),
            SystemMessageMode::Parameter => (
                message_adapter.to_openai(&request.messages, None),
                request.system_prompt.as_ref().map(|s| Value::String(s.clone())),
            ),
        };

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(ToolAdapter::new(Protocol::Custom).to_custom(&request.tools, &self.config.tool_format))
        };

        let ctx = TemplateContext {
            model: Value::String(request.model.clone()),
            messages: Value::Array(messages),
            system,
            tools: tools.map(Value::Array),
            max_tokens: request.max_tokens.map(|v| Value::from(v)),
            temperature: request.temperature.map(|v| Value::from(v)),
            top_p: request.top_p.map(|v| Value::from(v)),
            stream: Value::Bool(request.stream),
        };

        interpolate(&self.config.request.body_template, &ctx)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.auth.auth_type {
            AuthType::Bearer => builder.bearer_auth(&self.api_key),
            AuthType::Header => {
                let header_name = self.config.auth.header_name.clone().unwrap_or_else(|| "Authorization".to_string());
                builder.header(header_name, self.api_key.clone())
            }
            AuthType::ApiKey => {
                let header_name = self.config.auth.header_name.clone().unwrap_or_else(|| "x-api-key".to_string());
                builder.header(header_name, self.api_key.clone())
            }
            AuthType::None => builder,
        }
    }
}

/// Placeholder values substituted into `AdapterConfig.request.body_template`.
struct TemplateContext {
    model: Value,
    messages: Value,
    system: Option<Value>,
    tools: Option<Value>,
    max_tokens: Option<Value>,
    temperature: Option<Value>,
    top_p: Option<Value>,
    stream: Value,
}

/// Walks `template`, replacing whole-value placeholders (`"{{model}}"`, etc.)
/// with the matching field from `ctx`. A placeholder with no value (e.g.
/// `{{tools}}` when no tools are configured) drops its enclosing object key
/// rather than serializing `null`.
fn interpolate(template: &Value, ctx: &TemplateContext) -> Value {
    match template {
        Value::String(s) => match s.as_str() {
            "{{model}}" => ctx.model.clone(),
            "{{messages}}" => ctx.messages.clone(),
            "{{system}}" => ctx.system.clone().unwrap_or(Value::Null),
            "{{tools}}" => ctx.tools.clone().unwrap_or(Value::Null),
            "{{max_tokens}}" => ctx.max_tokens.clone().unwrap_or(Value::Null),
            "{{temperature}}" => ctx.temperature.clone().unwrap_or(Value::Null),
            "{{top_p}}" => ctx.top_p.clone().unwrap_or(Value::Null),
            "{{stream}}" => ctx.stream.clone(),
            _ => Value::String(s.clone()),
        },
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let is_placeholder = matches!(value, Value::String(s) if s.starts_with("{{") && s.ends_with("}}"));
                let resolved = interpolate(value, ctx);
                if is_placeholder && resolved.is_null() {
                    continue;
                }
                out.insert(key.clone(), resolved);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate(v, ctx)).collect()),
        other => other.clone(),
    }
}

/// Extracts zero or more tool calls out of one streamed chunk per
/// `ResponseConfig`'s dotted-path fields.
fn extract_tool_calls(chunk: &Value, response: &ResponseConfig) -> Vec<WireToolCall> {
    let Some(tool_field) = &response.tool_call_field else {
        return Vec::new();
    };
    let Some(tool_value) = sse::json_path(chunk, tool_field) else {
        return Vec::new();
    };

    let entries: Vec<&Value> = match tool_value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let name = response
                .tool_name_path
                .as_deref()
                .and_then(|p| sse::json_path(entry, p))
                .and_then(|v| v.as_str())?
                .to_string();
            let id = response
                .tool_id_path
                .as_deref()
                .and_then(|p| sse::json_path(entry, p))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("custom_{}", uuid::Uuid::new_v4()));
            let arguments = response
                .tool_args_path
                .as_deref()
                .and_then(|p| sse::json_path(entry, p))
                .cloned()
                .unwrap_or(Value::Null);
            Some(WireToolCall { id, name, arguments })
        })
        .collect()
}

#[async_trait]
impl Provider for CustomHttpProvider {
    fn name(&self) -> &str {
        "custom_http"
    }

    async fn chat(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let body = self.build_body(&request);
        let endpoint = self.endpoint(&request);

        debug!(endpoint = %endpoint, dashscope_style = self.config.is_dashscope_style(), "custom http chat stream");

        let mut builder = match self.config.request.method {
            HttpMethod::Post => self.client.post(&endpoint).json(&body),
            HttpMethod::Get => self.client.get(&endpoint).query(&body),
        };
        for (name, value) in &self.config.request.headers {
            builder = builder.header(name, value);
        }
        builder = self.apply_auth(builder);

        let response = builder.send().await.map_err(|e| ProviderError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http(status, &text));
        }

        let cancellation = request.cancellation.clone();
        let response_config = self.config.response.clone();
        let event_stream = response.bytes_stream().eventsource();

        let output = async_stream::stream! {
            futures::pin_mut!(event_stream);

            loop {
                if cancellation.is_cancelled() {
                    yield Err(ProviderError::aborted());
                    return;
                }

                let next = match tokio::time::timeout(Duration::from_secs(300), event_stream.next()).await {
                    Ok(Some(result)) => result,
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(ProviderError::timeout("no data within total stream budget"));
                        return;
                    }
                };

                let event = match next {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(ProviderError::network(e.to_string()));
                        return;
                    }
                };

                let data = event.data.trim();
                if data == response_config.done_marker {
                    break;
                }
                if data.is_empty() {
                    continue;
                }

                let chunk: Value = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                if let Some(reasoning_field) = &response_config.reasoning_field {
                    if let Some(text) = sse::json_path(&chunk, reasoning_field).and_then(|v| v.as_str()) {
                        if !text.is_empty() {
                            yield Ok(StreamEvent::reasoning(text, ReasoningPhase::Delta));
                        }
                    }
                }

                if let Some(text) = sse::json_path(&chunk, &response_config.content_field).and_then(|v| v.as_str()) {
                    if !text.is_empty() {
                        yield Ok(StreamEvent::text(text));
                    }
                }

                for tool_call in extract_tool_calls(&chunk, &response_config) {
                    yield Ok(StreamEvent::tool_call_start(tool_call.id.clone(), tool_call.name.clone()));
                    yield Ok(StreamEvent::tool_call_end(tool_call));
                }
            }
        };

        Ok(Box::pin(output))
    }
}

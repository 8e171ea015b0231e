//! Anthropic Messages API provider: hand-rolled `reqwest` + SSE, since
//! Anthropic has no official streaming Rust client in the teacher's stack.
//! Mirrors the shape of a real `eventsource-stream` + `async-stream` Anthropic
//! client, generalized to the unified [`Provider`] contract.

use std::collections::HashMap;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conversation::{Message, Role};
use stream_event::{ReasoningPhase, StreamEvent, TokenUsage, ToolCall as WireToolCall};

use super::{ChatRequest, EventStream, ErrorKind, Provider, ProviderError};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_BASE.to_string(),
        }
    }

    /// Overrides the API base, for Anthropic-compatible gateways.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request_body(
        messages: &[Message],
        system_prompt: Option<&str>,
        model: &str,
        max_tokens: u32,
        temperature: Option<f32>,
        top_p: Option<f32>,
        tools: &[crate::tool_source::ToolSpec],
        stream: bool,
    ) -> CreateMessageRequest {
        let mut out = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                Role::System => {}
                Role::User => out.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: AnthropicContent::Text(message.content.clone()),
                }),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(AnthropicContentBlock::Text {
                            text: message.content.clone(),
                        });
                    }
                    for call in &message.tool_calls {
                        blocks.push(AnthropicContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.arguments.clone(),
                        });
                    }
                    if !blocks.is_empty() {
                        out.push(AnthropicMessage {
                            role: "assistant".to_string(),
                            content: AnthropicContent::Blocks(blocks),
                        });
                    }
                }
                Role::Tool => {
                    if let Some(tool_call_id) = &message.tool_call_id {
                        out.push(AnthropicMessage {
                            role: "user".to_string(),
                            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                                tool_use_id: tool_call_id.clone(),
                                content: message.content.clone(),
                                is_error: None,
                            }]),
                        });
                    }
                }
            }
        }

        let system = system_prompt.map(|s| AnthropicSystemPrompt::Text(s.to_string()));

        let anthropic_tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect(),
            )
        };

        CreateMessageRequest {
            model: model.to_string(),
            max_tokens,
            messages: out,
            system,
            temperature,
            top_p,
            stream: Some(stream),
            tool_choice: anthropic_tools.as_ref().map(|_| AnthropicToolChoice::Auto),
            tools: anthropic_tools,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let body = Self::build_request_body(
            &request.messages,
            request.system_prompt.as_deref(),
            &request.model,
            request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            request.temperature,
            request.top_p,
            &request.tools,
            true,
        );

        debug!(model = %request.model, message_count = body.messages.len(), "anthropic chat stream");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http(status, &text));
        }

        let cancellation = request.cancellation.clone();
        let event_stream = response.bytes_stream().eventsource();

        let output = async_stream::stream! {
            futures::pin_mut!(event_stream);
            // index -> (id, name, accumulated partial JSON)
            let mut pending_tool_use: HashMap<usize, (String, String, String)> = HashMap::new();

            loop {
                if cancellation.is_cancelled() {
                    yield Err(ProviderError::aborted());
                    return;
                }

                let next = match tokio::time::timeout(std::time::Duration::from_secs(300), event_stream.next()).await {
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

                if event.event == "message_stop" {
                    break;
                }
                if event.data.trim().is_empty() {
                    continue;
                }

                match event.event.as_str() {
                    "message_start" => {
                        if let Ok(start) = serde_json::from_str::<MessageStart>(&event.data) {
                            yield Ok(StreamEvent::Usage {
                                usage: TokenUsage {
                                    prompt_tokens: start.message.usage.input_tokens,
                                    completion_tokens: start.message.usage.output_tokens,
                                    cached_tokens: start.message.usage.cache_read_input_tokens.unwrap_or(0),
                                },
                            });
                        }
                    }
                    "content_block_start" => {
                        if let Ok(start) = serde_json::from_str::<ContentBlockStart>(&event.data) {
                            if let AnthropicContentBlock::ToolUse { id, name, .. } = start.content_block {
                                yield Ok(StreamEvent::tool_call_start(id.clone(), name.clone()));
                                pending_tool_use.insert(start.index, (id, name, String::new()));
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Ok(delta) = serde_json::from_str::<ContentBlockDelta>(&event.data) {
                            match delta.delta {
                                ContentDelta::TextDelta { text } => {
                                    yield Ok(StreamEvent::text(text));
                                }
                                ContentDelta::ThinkingDelta { thinking } => {
                                    yield Ok(StreamEvent::reasoning(thinking, ReasoningPhase::Delta));
                                }
                                ContentDelta::InputJsonDelta { partial_json } => {
                                    if let Some(entry) = pending_tool_use.get_mut(&delta.index) {
                                        entry.2.push_str(&partial_json);
                                        yield Ok(StreamEvent::ToolCallDelta {
                                            id: entry.0.clone(),
                                            arguments_fragment: partial_json,
                                            name: None,
                                        });
                                    }
                                }
                            }
                        }
                    }
                    "content_block_stop" => {
                        if let Ok(stop) = serde_json::from_str::<ContentBlockStop>(&event.data) {
                            if let Some((id, name, json)) = pending_tool_use.remove(&stop.index) {
                                let arguments = serde_json::from_str(&json)
                                    .unwrap_or_else(|_| serde_json::json!({}));
                                yield Ok(StreamEvent::tool_call_end(WireToolCall { id, name, arguments }));
                            }
                        }
                    }
                    "message_delta" => {
                        if let Ok(delta) = serde_json::from_str::<MessageDelta>(&event.data) {
                            if let Some(usage) = delta.usage {
                                yield Ok(StreamEvent::Usage {
                                    usage: TokenUsage {
                                        prompt_tokens: 0,
                                        completion_tokens: usage.output_tokens,
                                        cached_tokens: 0,
                                    },
                                });
                            }
                        }
                    }
                    "error" => {
                        warn!(data = %event.data, "anthropic stream error event");
                        yield Err(ProviderError::new(ErrorKind::ServerError, event.data));
                        return;
                    }
                    _ => {}
                }
            }
        };

        Ok(Box::pin(output))
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<AnthropicSystemPrompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<AnthropicToolChoice>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
enum AnthropicSystemPrompt {
    Text(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AnthropicTool {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
enum AnthropicToolChoice {
    #[serde(rename = "auto")]
    Auto,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    message: MessageStartContent,
}

#[derive(Debug, Deserialize)]
struct MessageStartContent {
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStart {
    index: usize,
    content_block: AnthropicContentBlock,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    index: usize,
    delta: ContentDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct ContentBlockStop {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(default)]
    usage: Option<AnthropicUsageDelta>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsageDelta {
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_source::ToolSpec;

    #[test]
    fn system_prompt_becomes_top_level_field_not_a_message() {
        let messages = vec![Message::user("hi")];
        let body = AnthropicProvider::build_request_body(
            &messages,
            Some("be terse"),
            "claude-sonnet-4-20250514",
            1024,
            None,
            None,
            &[],
            true,
        );
        assert!(body.system.is_some());
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn tool_result_message_becomes_user_tool_result_block() {
        let messages = vec![Message::tool_result("call_1", "42")];
        let body = AnthropicProvider::build_request_body(
            &messages, None, "claude-sonnet-4-20250514", 1024, None, None, &[], true,
        );
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        match &body.messages[0].content {
            AnthropicContent::Blocks(blocks) => match &blocks[0] {
                AnthropicContentBlock::ToolResult { tool_use_id, content, .. } => {
                    assert_eq!(tool_use_id, "call_1");
                    assert_eq!(content, "42");
                }
                _ => panic!("expected tool_result block"),
            },
            _ => panic!("expected blocks content"),
        }
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let assistant = Message::assistant("checking").with_tool_calls(vec![
            crate::conversation::ToolCall::new("call_1", "read_file", serde_json::json!({"path": "a.rs"})),
        ]);
        let body = AnthropicProvider::build_request_body(
            &[assistant], None, "claude-sonnet-4-20250514", 1024, None, None, &[], true,
        );
        match &body.messages[0].content {
            AnthropicContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                matches!(blocks[1], AnthropicContentBlock::ToolUse { .. });
            }
            _ => panic!("expected blocks content"),
        }
    }

    #[test]
    fn tools_are_included_with_auto_choice_when_non_empty() {
        let tools = vec![ToolSpec::new("read_file", "reads a file", serde_json::json!({"type": "object"}))];
        let body = AnthropicProvider::build_request_body(
            &[Message::user("hi")], None, "claude-sonnet-4-20250514", 1024, None, None, &tools, true,
        );
        assert!(body.tools.is_some());
        assert!(body.tool_choice.is_some());
    }
}

//! OpenAI-compatible provider, built on `async-openai`'s streaming client the
//! way the teacher's `ChatOpenAI` uses it, generalized to the unified
//! [`Provider`] contract and the normalized [`stream_event::StreamEvent`] stream.

use std::collections::HashMap;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageFunctionToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionTools,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObject, ToolChoiceOptions,
    },
    Client,
};
use async_trait::async_trait;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::conversation::{Message, Role};
use stream_event::{ReasoningPhase, StreamEvent, TokenUsage, ToolCall as WireToolCall};

use super::{sse, ChatRequest, EventStream, ErrorKind, Provider, ProviderError};

/// OpenAI-compatible provider: the real OpenAI API, or any server implementing
/// the same Chat Completions streaming wire format.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    reasoning_field: Option<String>,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            reasoning_field: None,
        }
    }

    pub fn with_config(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
            reasoning_field: None,
        }
    }

    /// Sets a configurable dotted-path field (e.g. `"reasoning"`) the raw chunk
    /// JSON is checked for when a model exposes chain-of-thought text (§4.3).
    pub fn with_reasoning_field(mut self, field: impl Into<String>) -> Self {
        self.reasoning_field = Some(field.into());
        self
    }

    fn messages_to_request(
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Vec<ChatCompletionRequestMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            out.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage::from(system),
            ));
        }

        for message in messages {
            match message.role {
                Role::System => out.push(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(message.content.as_str()),
                )),
                Role::User => out.push(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(message.content.as_str()),
                )),
                Role::Assistant => {
                    let assistant: ChatCompletionRequestAssistantMessage = if message.tool_calls.is_empty() {
                        (message.content.as_str()).into()
                    } else {
                        let tool_calls: Vec<ChatCompletionMessageToolCalls> = message
                            .tool_calls
                            .iter()
                            .map(|tc| {
                                ChatCompletionMessageToolCalls::Function(ChatCompletionMessageFunctionToolCall {
                                    id: tc.id.clone(),
                                    function: FunctionCall {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.to_string(),
                                    },
                                })
                            })
                            .collect();
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(message.content.as_str())
                            .tool_calls(tool_calls)
                            .build()
                            .expect("assistant message with tool_calls is always a valid builder input")
                    };
                    out.push(ChatCompletionRequestMessage::Assistant(assistant));
                }
                Role::Tool => {
                    let tool_call_id = message.tool_call_id.clone().unwrap_or_default();
                    let tool_message = ChatCompletionRequestToolMessageArgs::default()
                        .content(message.content.as_str())
                        .tool_call_id(tool_call_id)
                        .build()
                        .expect("tool message with content and tool_call_id is always a valid builder input");
                    out.push(ChatCompletionRequestMessage::Tool(tool_message));
                }
            }
        }

        out
    }

    fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, ProviderError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.clone());
        args.messages(Self::messages_to_request(
            &request.messages,
            request.system_prompt.as_deref(),
        ));
        args.stream(request.stream);

        if !request.tools.is_empty() {
            let tools: Vec<ChatCompletionTools> = request
                .tools
                .iter()
                .map(|t| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: Some(t.input_schema.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(tools);
            args.tool_choice(ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto));
        }

        if let Some(max_tokens) = request.max_tokens {
            args.max_tokens(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        if let Some(top_p) = request.top_p {
            args.top_p(top_p);
        }

        args.build()
            .map_err(|e| ProviderError::new(ErrorKind::InvalidRequest, e.to_string()))
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let built = self.build_request(&request)?;

        debug!(
            model = %request.model,
            message_count = request.messages.len(),
            tools_count = request.tools.len(),
            "openai chat create_stream"
        );
        if let Ok(js) = serde_json::to_string_pretty(&built) {
            trace!(request = %js, "openai request body");
        }

        let reasoning_field = self.reasoning_field.clone();
        let cancellation = request.cancellation.clone();

        let mut chunk_stream = self
            .client
            .chat()
            .create_stream(built)
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let output = async_stream::stream! {
            // index -> (id, name, accumulated arguments); also tracks whether a
            // ToolCallStart has been emitted yet for that index.
            let mut tool_calls: HashMap<u32, (String, String, String, bool)> = HashMap::new();

            loop {
                if cancellation.is_cancelled() {
                    yield Err(ProviderError::aborted());
                    return;
                }

                let next = match tokio::time::timeout(std::time::Duration::from_secs(300), chunk_stream.next()).await {
                    Ok(Some(result)) => result,
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(ProviderError::timeout("no data within total stream budget"));
                        return;
                    }
                };

                let response = match next {
                    Ok(r) => r,
                    Err(e) => {
                        yield Err(ProviderError::network(e.to_string()));
                        return;
                    }
                };

                if let Some(usage) = response.usage.as_ref() {
                    yield Ok(StreamEvent::Usage {
                        usage: TokenUsage {
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                            cached_tokens: 0,
                        },
                    });
                }

                for choice in &response.choices {
                    let delta = &choice.delta;

                    if let Some(reasoning_field) = &reasoning_field {
                        if let Ok(raw) = serde_json::to_value(delta) {
                            if let Some(text) = sse::json_path(&raw, reasoning_field).and_then(|v| v.as_str()) {
                                if !text.is_empty() {
                                    yield Ok(StreamEvent::reasoning(text, ReasoningPhase::Delta));
                                }
                            }
                        }
                    }

                    if let Some(content) = &delta.content {
                        if !content.is_empty() {
                            yield Ok(StreamEvent::text(content.clone()));
                        }
                    }

                    if let Some(deltas) = &delta.tool_calls {
                        for tc in deltas {
                            let entry = tool_calls
                                .entry(tc.index)
                                .or_insert_with(|| (String::new(), String::new(), String::new(), false));

                            if let Some(id) = &tc.id {
                                if !id.is_empty() {
                                    entry.0 = id.clone();
                                }
                            }
                            if let Some(func) = &tc.function {
                                if let Some(name) = &func.name {
                                    entry.1.push_str(name);
                                }
                            }

                            if !entry.3 && !entry.0.is_empty() && !entry.1.is_empty() {
                                yield Ok(StreamEvent::tool_call_start(entry.0.clone(), entry.1.clone()));
                                entry.3 = true;
                            }

                            if let Some(func) = &tc.function {
                                if let Some(arguments) = &func.arguments {
                                    if !arguments.is_empty() && entry.3 {
                                        entry.2.push_str(arguments);
                                        yield Ok(StreamEvent::ToolCallDelta {
                                            id: entry.0.clone(),
                                            arguments_fragment: arguments.clone(),
                                            name: None,
                                        });
                                    } else if !arguments.is_empty() {
                                        entry.2.push_str(arguments);
                                    }
                                }
                            }
                        }
                    }
                }
            }

            for (_, (id, name, arguments, started)) in tool_calls {
                if !started || id.is_empty() {
                    continue;
                }
                let parsed = serde_json::from_str(&arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(arguments));
                yield Ok(StreamEvent::ToolCallEnd {
                    tool_call: WireToolCall { id, name, arguments: parsed },
                });
            }
        };

        Ok(Box::pin(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_prepended_as_a_system_message() {
        let messages = vec![Message::user("hi")];
        let request = OpenAiProvider::messages_to_request(&messages, Some("be terse"));
        assert_eq!(request.len(), 2);
        matches!(request[0], ChatCompletionRequestMessage::System(_));
    }

    #[test]
    fn assistant_message_with_tool_calls_builds_without_panicking() {
        let mut assistant = Message::assistant("");
        assistant.tool_calls.push(crate::conversation::ToolCall::new(
            "call_1",
            "read_file",
            serde_json::json!({"path": "a.rs"}),
        ));
        let request = OpenAiProvider::messages_to_request(&[assistant], None);
        assert_eq!(request.len(), 1);
    }
}

//! Gemini `generateContent` (streaming, SSE) provider: hand-rolled `reqwest` +
//! `eventsource-stream`, same shape as the Anthropic provider. Gemini never
//! assigns its own tool-call ids, so one is synthesized per call and tracked
//! so the follow-up `functionResponse` can reference it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use stream_event::{ReasoningPhase, StreamEvent, TokenUsage, ToolCall as WireToolCall};

use super::message_adapter::{MessageAdapter, Protocol};
use super::tool_adapter::ToolAdapter;
use super::{ChatRequest, EventStream, ErrorKind, Provider, ProviderError};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Shared across every `chat` call on this provider instance so synthesized
    /// tool-call ids stay unique for the life of a conversation (Gemini itself
    /// never assigns call ids).
    call_counter: Arc<AtomicU64>,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
            call_counter: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn next_call_id(&self) -> String {
        let idx = self.call_counter.fetch_add(1, Ordering::SeqCst);
        format!("gemini_call_{idx}")
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<EventStream, ProviderError> {
        let message_adapter = MessageAdapter::new(Protocol::Gemini);
        let (contents, system_instruction) =
            message_adapter.to_gemini(&request.messages, request.system_prompt.as_deref());

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(ToolAdapter::new(Protocol::Gemini).to_gemini(&request.tools))
        };

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": request.max_tokens.unwrap_or(4096),
                "temperature": request.temperature,
                "topP": request.top_p,
            },
        });
        if let Some(system) = system_instruction {
            body["systemInstruction"] = system;
        }
        if let Some(tools) = tools {
            body["tools"] = json!([tools]);
            body["toolConfig"] = json!({"functionCallingConfig": {"mode": "AUTO"}});
        }

        debug!(model = %request.model, "gemini chat stream");

        let response = self
            .client
            .post(format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, request.model
            ))
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
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
        let call_counter = self.call_counter.clone();

        let output = async_stream::stream! {
            futures::pin_mut!(event_stream);

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

                if event.data.trim().is_empty() || event.data == "[DONE]" {
                    continue;
                }

                let parsed: GenerateContentResponse = match serde_json::from_str(&event.data) {
                    Ok(p) => p,
                    Err(e) => {
                        yield Err(ProviderError::new(ErrorKind::Unknown, format!("malformed gemini chunk: {e}")));
                        return;
                    }
                };

                if let Some(usage) = parsed.usage_metadata {
                    yield Ok(StreamEvent::Usage {
                        usage: TokenUsage {
                            prompt_tokens: usage.prompt_token_count.unwrap_or(0),
                            completion_tokens: usage.candidates_token_count.unwrap_or(0),
                            cached_tokens: usage.cached_content_token_count.unwrap_or(0),
                        },
                    });
                }

                for candidate in parsed.candidates.unwrap_or_default() {
                    let Some(content) = candidate.content else { continue };
                    for part in content.parts {
                        if let Some(thought) = part.thought {
                            if thought {
                                if let Some(text) = part.text {
                                    yield Ok(StreamEvent::reasoning(text, ReasoningPhase::Delta));
                                }
                                continue;
                            }
                        }
                        if let Some(text) = part.text {
                            if !text.is_empty() {
                                yield Ok(StreamEvent::text(text));
                            }
                        }
                        if let Some(function_call) = part.function_call {
                            let idx = call_counter.fetch_add(1, Ordering::SeqCst);
                            let id = format!("gemini_call_{idx}");

                            yield Ok(StreamEvent::tool_call_start(id.clone(), function_call.name.clone()));
                            yield Ok(StreamEvent::ToolCallDelta {
                                id: id.clone(),
                                arguments_fragment: function_call.args.to_string(),
                                name: None,
                            });
                            yield Ok(StreamEvent::tool_call_end(WireToolCall {
                                id,
                                name: function_call.name,
                                arguments: function_call.args,
                            }));
                        }
                    }
                }
            }
        };

        Ok(Box::pin(output))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default, rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(default, rename = "cachedContentTokenCount")]
    cached_content_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    #[test]
    fn next_call_id_increments_and_is_prefixed() {
        let provider = GeminiProvider::new("key");
        let first = provider.next_call_id();
        let second = provider.next_call_id();
        assert!(first.starts_with("gemini_call_"));
        assert_ne!(first, second);
    }

    #[test]
    fn request_body_carries_system_instruction_and_tools() {
        let adapter = MessageAdapter::new(Protocol::Gemini);
        let (contents, system) = adapter.to_gemini(&[Message::user("hi")], Some("be terse"));
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(system.unwrap()["parts"][0]["text"], "be terse");
    }
}

//! Mock provider for tests: a queue of scripted responses, replayed as
//! `StreamEvent`s with no network calls. Mirrors the teacher's `MockLlm` (fixed
//! content and tool calls, optional stateful multi-round mode) adapted to the
//! streaming `Provider` contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use stream_event::{ReasoningPhase, StreamEvent, TokenUsage, ToolCall};

use super::{ChatRequest, EventStream, Provider, ProviderError};

/// One scripted turn: visible text, optional reasoning, optional tool calls,
/// optional usage to report.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    pub content: String,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl ScriptedResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_call(mut self, id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        self.tool_calls.push(ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        });
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Replays a fixed sequence of [`ScriptedResponse`]s, one per `chat` call; the
/// last response repeats once the queue is exhausted, so callers that loop
/// past the scripted turns don't panic.
pub struct MockProvider {
    responses: Mutex<Vec<ScriptedResponse>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_no_tool_calls(content: impl Into<String>) -> Self {
        Self::new(vec![ScriptedResponse::text(content)])
    }

    fn next_response(&self) -> ScriptedResponse {
        let responses = self.responses.lock().expect("mock provider mutex poisoned");
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index)
            .or_else(|| responses.last())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<EventStream, ProviderError> {
        let response = self.next_response();
        let mut events = Vec::new();

        if let Some(reasoning) = &response.reasoning {
            events.push(Ok(StreamEvent::reasoning(reasoning.clone(), ReasoningPhase::Start)));
            events.push(Ok(StreamEvent::reasoning(reasoning.clone(), ReasoningPhase::Delta)));
            events.push(Ok(StreamEvent::reasoning(String::new(), ReasoningPhase::End)));
        }

        if !response.content.is_empty() {
            events.push(Ok(StreamEvent::text(response.content.clone())));
        }

        for tool_call in response.tool_calls {
            events.push(Ok(StreamEvent::tool_call_start(tool_call.id.clone(), tool_call.name.clone())));
            events.push(Ok(StreamEvent::ToolCallEnd { tool_call }));
        }

        if let Some(usage) = response.usage {
            events.push(Ok(StreamEvent::Usage { usage }));
        }

        Ok(Box::pin(stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    #[tokio::test]
    async fn replays_scripted_text_as_a_single_text_event() {
        let provider = MockProvider::with_no_tool_calls("hello there");
        let request = ChatRequest::new("mock-model", vec![Message::user("hi")]);
        let result = provider
            .chat_collect(request, |event| {
                if let StreamEvent::Text { delta } = event {
                    assert_eq!(delta, "hello there");
                }
            })
            .await
            .unwrap();
        assert!(result.usage.is_none());
    }

    #[tokio::test]
    async fn emits_tool_call_start_then_end_for_each_scripted_call() {
        let response = ScriptedResponse::text("checking").with_tool_call(
            "call_1",
            "read_file",
            serde_json::json!({"path": "a.rs"}),
        );
        let provider = MockProvider::new(vec![response]);
        let request = ChatRequest::new("mock-model", vec![Message::user("hi")]);

        let mut saw_start = false;
        let mut saw_end = false;
        provider
            .chat_collect(request, |event| match event {
                StreamEvent::ToolCallStart { id, .. } => {
                    assert_eq!(id, "call_1");
                    saw_start = true;
                }
                StreamEvent::ToolCallEnd { tool_call } => {
                    assert!(saw_start, "end must follow start");
                    assert_eq!(tool_call.name, "read_file");
                    saw_end = true;
                }
                _ => {}
            })
            .await
            .unwrap();
        assert!(saw_start && saw_end);
    }

    #[tokio::test]
    async fn repeats_last_scripted_response_once_queue_is_exhausted() {
        let provider = MockProvider::new(vec![ScriptedResponse::text("only one")]);
        let request = || ChatRequest::new("mock-model", vec![Message::user("hi")]);

        for _ in 0..3 {
            provider
                .chat_collect(request(), |event| {
                    if let StreamEvent::Text { delta } = event {
                        assert_eq!(delta, "only one");
                    }
                })
                .await
                .unwrap();
        }
    }
}

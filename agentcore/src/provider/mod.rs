//! Provider abstraction (§4.3): one trait, four wire-protocol implementations
//! (OpenAI-compatible, Anthropic, Gemini, custom HTTP), each translating a
//! [`ChatRequest`] into its own wire format and parsing the response back into
//! the protocol-agnostic [`stream_event::StreamEvent`] stream.

pub mod adapter_config;
pub mod anthropic;
pub mod custom_http;
pub mod error;
pub mod gemini;
pub mod llm_config;
pub mod message_adapter;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod sse;
pub mod token_accounter;
pub mod tool_adapter;

pub use adapter_config::AdapterConfig;
pub use anthropic::AnthropicProvider;
pub use custom_http::CustomHttpProvider;
pub use error::{ErrorKind, ProviderError};
pub use gemini::GeminiProvider;
pub use llm_config::{build_provider, LlmConfig, LlmConfigError, ProviderKind};
pub use message_adapter::{MessageAdapter, Protocol, VisionConfig};
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use token_accounter::TokenAccounter;
pub use tool_adapter::{extract_xml_tool_calls, strip_xml_tool_calls, ToolAdapter};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::conversation::Message;
use crate::tool_source::ToolSpec;
use stream_event::{StreamEvent, TokenUsage};

/// A unified chat request, independent of which wire protocol ends up serving it.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stream: bool,
    pub cancellation: CancellationToken,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stream: true,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// The terminal result of a `chat` call: the final usage, if the provider reported
/// one that supersedes anything seen mid-stream.
#[derive(Debug, Clone, Default)]
pub struct ChatResult {
    pub usage: Option<TokenUsage>,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Shared contract every wire-protocol adapter implements: unified request in,
/// normalized event stream out, final result once the stream completes.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name, for logging and config summaries (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Streams the completion as [`StreamEvent`]s. The returned stream is exhausted
    /// (or an error is yielded and the stream ends) before the call is considered done;
    /// callers that need the final [`ChatResult`] should track the last `Usage` event
    /// themselves, or use [`Provider::chat_collect`].
    async fn chat(&self, request: ChatRequest) -> Result<EventStream, ProviderError>;

    /// Convenience wrapper: drains `chat`'s stream, forwarding each event to `on_event`,
    /// and returns the final [`ChatResult`] built from the last `Usage` event seen.
    async fn chat_collect(
        &self,
        request: ChatRequest,
        mut on_event: impl FnMut(StreamEvent) + Send,
    ) -> Result<ChatResult, ProviderError> {
        use futures::StreamExt;

        let mut stream = self.chat(request).await?;
        let mut result = ChatResult::default();
        while let Some(event) = stream.next().await {
            let event = event?;
            if let StreamEvent::Usage { usage } = &event {
                result.usage = Some(*usage);
            }
            on_event(event);
        }
        Ok(result)
    }
}

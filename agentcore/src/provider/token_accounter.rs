//! Exact BPE token accounting (§4.1), used only for budget arithmetic: provider-
//! reported usage always wins once a completion has actually happened.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::conversation::{Message, Role};

const PER_MESSAGE_OVERHEAD: u32 = 4;
const PER_TOOL_CALL_OVERHEAD: u32 = 10;
const IMAGE_TOKENS: u32 = 85;

static BPE: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base tokenizer ranks are bundled"));

/// Counts tokens the way the GPT tokenizer family does, so budget decisions are
/// deterministic across platforms for pure ASCII input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenAccounter;

impl TokenAccounter {
    pub fn new() -> Self {
        Self
    }

    /// Raw text token count via `cl100k_base`.
    pub fn count(&self, text: &str) -> u32 {
        BPE.encode_ordinary(text).len() as u32
    }

    /// Counts one message: its text, plus structural overhead, plus each tool
    /// call's own overhead and the size of its name and serialized arguments.
    pub fn count_message(&self, message: &Message) -> u32 {
        let mut total = PER_MESSAGE_OVERHEAD;
        total += self.count(&message.content);

        for tool_call in &message.tool_calls {
            total += PER_TOOL_CALL_OVERHEAD;
            total += self.count(&tool_call.name);
            total += self.count(&tool_call.arguments.to_string());
        }

        if matches!(message.role, Role::Assistant) && message.reasoning.is_some() {
            total += self.count(message.reasoning.as_deref().unwrap_or_default());
        }

        total
    }

    /// Total over a full message list.
    pub fn count_total(&self, messages: &[Message]) -> u32 {
        messages.iter().map(|m| self.count_message(m)).sum()
    }

    /// Fixed per-image cost (low-resolution), used when counting vision content.
    pub fn count_image(&self) -> u32 {
        IMAGE_TOKENS
    }
}

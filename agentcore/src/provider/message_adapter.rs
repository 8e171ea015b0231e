//! Translates the core's [`Message`] list into each wire protocol's own shape
//! (§4.4): system-prompt routing, tool-result framing, and optional image
//! inclusion all vary by protocol.

use serde_json::{json, Value};

use crate::conversation::{Message, Role};

/// Wire protocol a [`MessageAdapter`] is targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    OpenAi,
    Anthropic,
    Gemini,
    Custom,
}

/// Whether image content parts are included for a given protocol.
///
/// Default is ON for OpenAI/Anthropic/Gemini, OFF for custom HTTP adapters
/// unless the adapter config turns it on explicitly.
#[derive(Debug, Clone, Copy)]
pub struct VisionConfig {
    pub enabled: bool,
}

impl VisionConfig {
    pub fn for_protocol(protocol: Protocol) -> Self {
        Self {
            enabled: !matches!(protocol, Protocol::Custom),
        }
    }
}

/// Protocol-shaped system prompt: either a separate field (Anthropic/Gemini) or
/// folded into the message list (OpenAI/custom-in-role-mode).
pub enum SystemPromptPlacement {
    /// No separate field; a `{role: "system"}` message was prepended to `messages`.
    InlineMessage,
    /// Anthropic's top-level `system` array of `{type: "text", text}` blocks.
    AnthropicField(Value),
    /// Gemini's `systemInstruction` content object.
    GeminiField(Value),
    /// Custom adapter's named parameter, per `AdapterConfig.messageFormat`.
    NamedParameter(String, Value),
    None,
}

/// Converts the core message list into a protocol-shaped request, applying
/// §4.4's system-prompt routing and tool-result framing rules.
pub struct MessageAdapter {
    pub protocol: Protocol,
    pub vision: VisionConfig,
}

impl MessageAdapter {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            vision: VisionConfig::for_protocol(protocol),
            protocol,
        }
    }

    /// OpenAI-compatible: `{role, content}` objects; tool results use
    /// `{role: "tool", tool_call_id, content}`; system prompt is a prepended
    /// `{role: "system"}` message.
    pub fn to_openai(&self, messages: &[Message], system_prompt: Option<&str>) -> Vec<Value> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            out.push(json!({"role": "system", "content": system}));
        }
        for message in messages {
            match message.role {
                Role::System => out.push(json!({"role": "system", "content": message.content})),
                Role::User => out.push(json!({"role": "user", "content": message.content})),
                Role::Assistant => {
                    let mut obj = json!({"role": "assistant", "content": message.content});
                    if !message.tool_calls.is_empty() {
                        let tool_calls: Vec<Value> = message
                            .tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments.to_string(),
                                    }
                                })
                            })
                            .collect();
                        obj["tool_calls"] = Value::Array(tool_calls);
                    }
                    out.push(obj);
                }
                Role::Tool => out.push(json!({
                    "role": "tool",
                    "tool_call_id": message.tool_call_id,
                    "content": message.content,
                })),
            }
        }
        out
    }

    /// Anthropic: `messages` excludes system turns; `system` is a separate
    /// top-level array of text blocks. Tool results become a `user` message with a
    /// `tool_result` content block.
    pub fn to_anthropic(&self, messages: &[Message], system_prompt: Option<&str>) -> (Vec<Value>, Option<Value>) {
        let system = system_prompt.map(|s| json!([{"type": "text", "text": s}]));
        let mut out = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                Role::System => continue,
                Role::User => out.push(json!({
                    "role": "user",
                    "content": [{"type": "text", "text": message.content}],
                })),
                Role::Assistant => {
                    let mut blocks: Vec<Value> = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": message.content}));
                    }
                    for tc in &message.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    if !blocks.is_empty() {
                        out.push(json!({"role": "assistant", "content": blocks}));
                    }
                }
                Role::Tool => out.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id,
                        "content": message.content,
                    }],
                })),
            }
        }

        (out, system)
    }

    /// Gemini: a sequence of `{role: user|model, parts}`. Rules applied here:
    /// conversation must start with a user turn (synthetic one prepended if not);
    /// consecutive same-role turns are merged (except `functionResponse` turns);
    /// tool results become `functionResponse` parts in a `user` turn.
    pub fn to_gemini(&self, messages: &[Message], system_prompt: Option<&str>) -> (Vec<Value>, Option<Value>) {
        let system_instruction = system_prompt.map(|s| json!({"parts": [{"text": s}]}));

        let mut turns: Vec<Value> = Vec::new();
        for message in messages {
            match message.role {
                Role::System => continue,
                Role::User => {
                    turns.push(json!({"role": "user", "parts": [{"text": message.content}]}));
                }
                Role::Assistant => {
                    let mut parts: Vec<Value> = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(json!({"text": message.content}));
                    }
                    for tc in &message.tool_calls {
                        parts.push(json!({"functionCall": {"name": tc.name, "args": tc.arguments}}));
                    }
                    if !parts.is_empty() {
                        turns.push(json!({"role": "model", "parts": parts}));
                    }
                }
                Role::Tool => {
                    let response = message
                        .tool_calls
                        .first()
                        .map(|_| json!({"result": message.content}))
                        .unwrap_or_else(|| {
                            serde_json::from_str(&message.content)
                                .unwrap_or_else(|_| json!({"result": message.content}))
                        });
                    turns.push(json!({
                        "role": "user",
                        "parts": [{"functionResponse": {
                            "id": message.tool_call_id,
                            "name": message.tool_name.clone().unwrap_or_default(),
                            "response": response,
                        }}],
                    }));
                }
            }
        }

        if turns.first().and_then(|t| t.get("role")).and_then(|r| r.as_str()) != Some("user") {
            turns.insert(0, json!({"role": "user", "parts": [{"text": "Continue the conversation."}]}));
        }

        let merged = merge_consecutive_same_role(turns);
        (merged, system_instruction)
    }
}

/// Merges consecutive same-role turns by concatenating their `parts`, except
/// turns whose parts contain a `functionResponse`, which never merge (§4.3c).
fn merge_consecutive_same_role(turns: Vec<Value>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::with_capacity(turns.len());
    for turn in turns {
        let is_function_response = turn
            .get("parts")
            .and_then(|p| p.as_array())
            .map(|parts| parts.iter().any(|p| p.get("functionResponse").is_some()))
            .unwrap_or(false);

        if !is_function_response {
            if let Some(last) = merged.last_mut() {
                let same_role = last.get("role") == turn.get("role");
                let last_is_function_response = last
                    .get("parts")
                    .and_then(|p| p.as_array())
                    .map(|parts| parts.iter().any(|p| p.get("functionResponse").is_some()))
                    .unwrap_or(false);
                if same_role && !last_is_function_response {
                    if let (Some(last_parts), Some(new_parts)) =
                        (last.get_mut("parts").and_then(|p| p.as_array_mut()), turn.get("parts").and_then(|p| p.as_array()))
                    {
                        last_parts.extend(new_parts.iter().cloned());
                        continue;
                    }
                }
            }
        }
        merged.push(turn);
    }
    merged
}

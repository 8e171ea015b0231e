//! Wraps declarative tool specs into each wire protocol's shape, and provides
//! the XML-extraction fallback (§4.4) for models that emit tool calls as text
//! instead of through a structured channel.

use serde_json::{json, Value};

use crate::conversation::ToolCall;
use crate::tool_source::ToolSpec;

use super::adapter_config::{ToolFormat, ToolWrapMode};
use super::message_adapter::Protocol;

pub struct ToolAdapter {
    pub protocol: Protocol,
}

impl ToolAdapter {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    pub fn to_openai(&self, tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }

    pub fn to_anthropic(&self, tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect()
    }

    pub fn to_gemini(&self, tools: &[ToolSpec]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect();
        json!({"functionDeclarations": declarations})
    }

    /// Wraps tools per `AdapterConfig.toolFormat` for a custom HTTP provider.
    pub fn to_custom(&self, tools: &[ToolSpec], format: &ToolFormat) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                let mut parameters = t.input_schema.clone();
                if !format.include_type {
                    if let Some(obj) = parameters.as_object_mut() {
                        obj.remove("type");
                    }
                }
                let mut inner = serde_json::Map::new();
                inner.insert("name".to_string(), json!(t.name));
                inner.insert("description".to_string(), json!(t.description));
                inner.insert(format.parameter_field.clone(), parameters);
                let inner = Value::Object(inner);

                match format.wrap_mode {
                    ToolWrapMode::None => inner,
                    ToolWrapMode::Function | ToolWrapMode::Tool => {
                        let mut wrapped = serde_json::Map::new();
                        wrapped.insert("type".to_string(), json!(format.wrap_field.clone()));
                        wrapped.insert(format.wrap_field.clone(), inner);
                        Value::Object(wrapped)
                    }
                }
            })
            .collect()
    }
}

/// Parses `<tool_call><function=NAME><parameter=KEY>VALUE</parameter>...</function></tool_call>`
/// blocks out of finalized assistant text (§4.4's XML-extraction fallback). Only
/// called when no tool calls arrived via the structured channel, or by a `mixed`
/// adapter after a failed JSON parse attempt.
pub fn extract_xml_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<tool_call>") {
        let after_start = &rest[start + "<tool_call>".len()..];
        let Some(end) = after_start.find("</tool_call>") else {
            break;
        };
        let block = &after_start[..end];
        rest = &after_start[end + "</tool_call>".len()..];

        if let Some(call) = parse_one_xml_tool_call(block) {
            calls.push(call);
        }
    }

    calls
}

/// Strips `<tool_call>...</tool_call>` blocks out of assistant text, leaving only
/// what the user should see once the XML fallback has parsed the calls out.
pub fn strip_xml_tool_calls(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<tool_call>") {
        out.push_str(&rest[..start]);
        let after_start = &rest[start + "<tool_call>".len()..];
        match after_start.find("</tool_call>") {
            Some(end) => rest = &after_start[end + "</tool_call>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn parse_one_xml_tool_call(block: &str) -> Option<ToolCall> {
    let function_start = block.find("<function=")?;
    let after = &block[function_start + "<function=".len()..];
    let name_end = after.find('>')?;
    let name = after[..name_end].to_string();
    let body = &after[name_end + 1..];

    let mut arguments = serde_json::Map::new();
    let mut cursor = body;
    while let Some(param_start) = cursor.find("<parameter=") {
        let after_param = &cursor[param_start + "<parameter=".len()..];
        let Some(key_end) = after_param.find('>') else {
            break;
        };
        let key = after_param[..key_end].to_string();
        let value_region = &after_param[key_end + 1..];
        let Some(value_end) = value_region.find("</parameter>") else {
            break;
        };
        let raw_value = value_region[..value_end].trim();
        let value = serde_json::from_str::<Value>(raw_value).unwrap_or_else(|_| json!(raw_value));
        arguments.insert(key, value);
        cursor = &value_region[value_end + "</parameter>".len()..];
    }

    let id = format!("xml_{}", uuid::Uuid::new_v4());
    Some(ToolCall::new(id, name, Value::Object(arguments)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_tool_call_with_json_and_string_parameters() {
        let text = r#"Sure, let me do that.
<tool_call><function=read_file><parameter=path>"src/main.rs"</parameter><parameter=max_lines>200</parameter></function></tool_call>"#;
        let calls = extract_xml_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments["path"], "src/main.rs");
        assert_eq!(calls[0].arguments["max_lines"], 200);
    }

    #[test]
    fn string_parameter_not_valid_json_is_kept_as_string() {
        let text = "<tool_call><function=write_file><parameter=content>hello world</parameter></function></tool_call>";
        let calls = extract_xml_tool_calls(text);
        assert_eq!(calls[0].arguments["content"], "hello world");
    }

    #[test]
    fn no_tool_call_blocks_yields_empty_vec() {
        assert!(extract_xml_tool_calls("just plain text").is_empty());
    }

    #[test]
    fn strip_xml_tool_calls_removes_the_block_and_keeps_surrounding_text() {
        let text = r#"Let me do this: <tool_call><function=read_file><parameter=path>"a.ts"</parameter></function></tool_call>"#;
        assert_eq!(strip_xml_tool_calls(text), "Let me do this:");
    }

    #[test]
    fn openai_wraps_tool_as_function_object() {
        let tools = vec![ToolSpec::new("read_file", "reads a file", json!({"type": "object"}))];
        let wrapped = ToolAdapter::new(Protocol::OpenAi).to_openai(&tools);
        assert_eq!(wrapped[0]["type"], "function");
        assert_eq!(wrapped[0]["function"]["name"], "read_file");
    }
}

//! Shared SSE helpers for the hand-rolled providers (Anthropic, Gemini, custom
//! HTTP). Frame splitting itself is `eventsource-stream`'s `Eventsource` trait,
//! used directly in each provider the way the rest of the corpus layers SSE
//! parsing over a `reqwest` byte stream; this module only holds the bits shared
//! across all three: the `[DONE]` sentinel and dotted-path JSON extraction for
//! [`super::custom_http`]'s configurable response field paths.

pub const DONE_MARKER: &str = "[DONE]";

/// Extracts a value at a dotted JSON path, e.g. `"delta.content"`.
pub fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

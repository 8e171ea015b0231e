//! Repetition / oscillation detection across agent-loop iterations (§4.10).
//!
//! The `AgentLoop` runs one [`LoopDetector::check`] per iteration, after tool
//! calls are extracted from a completion and before they're dispatched. Two
//! independent signals feed `is_loop`: the same tool-call set appearing twice in
//! a row (`consecutiveRepeats`), or a write tool about to write a path with the
//! exact content already recorded there.

use std::collections::{HashMap, VecDeque};

use crate::conversation::ToolCall;

const SIGNATURE_FIFO_SIZE: usize = 5;
const REPEAT_THRESHOLD: u32 = 2;

const WRITE_TOOL_NAMES: &[&str] = &["write_file", "create_file_or_folder"];
const SUGGESTION: &str = "The model appears to be repeating the same operation. Try a different \
                           approach, inspect the current file state, or ask the user for guidance.";

/// Outcome of one [`LoopDetector::check`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopCheck {
    pub is_loop: bool,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
}

impl LoopCheck {
    fn clean() -> Self {
        Self::default()
    }

    fn tripped(reason: impl Into<String>) -> Self {
        Self {
            is_loop: true,
            reason: Some(reason.into()),
            suggestion: Some(SUGGESTION.to_string()),
        }
    }
}

/// FNV-1a, matching the file cache's content hashing (§5) so both use the same
/// cheap, dependency-free fingerprint.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Per-thread loop-detection state: a size-5 FIFO of tool-call-set signatures,
/// a repeat counter reset on any mismatch, and the last content hash this
/// detector has seen written to each path.
#[derive(Default)]
pub struct LoopDetector {
    signatures: VecDeque<String>,
    consecutive_repeats: u32,
    last_written_hash: HashMap<String, u64>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted `name:JSON(arguments)` join for every call in one iteration, so
    /// call order within an iteration doesn't matter, only the set.
    fn signature(tool_calls: &[ToolCall]) -> String {
        let mut parts: Vec<String> = tool_calls
            .iter()
            .map(|c| format!("{}:{}", c.name, c.arguments))
            .collect();
        parts.sort();
        parts.join(",")
    }

    fn push_signature(&mut self, signature: String) {
        if self.signatures.len() >= SIGNATURE_FIFO_SIZE {
            self.signatures.pop_front();
        }
        self.signatures.push_back(signature);
    }

    /// Path of the first write-class call whose proposed content hash matches
    /// what this detector last recorded for that path, if any.
    fn idempotent_write(&self, tool_calls: &[ToolCall]) -> Option<String> {
        for call in tool_calls {
            if !WRITE_TOOL_NAMES.contains(&call.name.as_str()) {
                continue;
            }
            let path = call.arguments.get("path").and_then(|v| v.as_str())?;
            let content = call.arguments.get("content").and_then(|v| v.as_str()).unwrap_or("");
            let hash = fnv1a(content.as_bytes());
            if self.last_written_hash.get(path) == Some(&hash) {
                return Some(path.to_string());
            }
        }
        None
    }

    /// Records that `path` now holds `content`, so a later call proposing the
    /// identical bytes is recognized as an idempotent (no-op) write. Called by
    /// the dispatcher after a write tool call actually succeeds.
    pub fn record_write(&mut self, path: impl Into<String>, content: &str) {
        self.last_written_hash.insert(path.into(), fnv1a(content.as_bytes()));
    }

    /// Checks one iteration's tool-call set against prior iterations.
    ///
    /// An empty call set neither trips nor resets the repeat counter — there's
    /// no signature to compare (the loop is about to exit on its own, per
    /// §4.11 step d, with no dispatch to detect a loop in).
    pub fn check(&mut self, tool_calls: &[ToolCall]) -> LoopCheck {
        if tool_calls.is_empty() {
            return LoopCheck::clean();
        }

        let signature = Self::signature(tool_calls);
        let repeated = self.signatures.contains(&signature);
        self.consecutive_repeats = if repeated { self.consecutive_repeats + 1 } else { 0 };
        self.push_signature(signature);

        if self.consecutive_repeats >= REPEAT_THRESHOLD {
            return LoopCheck::tripped("Repeated tool call");
        }

        if let Some(path) = self.idempotent_write(tool_calls) {
            return LoopCheck::tripped(format!("idempotent write to {path}"));
        }

        LoopCheck::clean()
    }
}

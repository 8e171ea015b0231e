//! ContextCompactor (§4.9): a five-level ladder that keeps a thread's message
//! list under its model's context limit, from passing it through untouched
//! to replacing the entire history with a handoff document.

mod summary;
mod turns;

pub use summary::{FileChangeRecord, HandoffDocument, StructuredSummary};
pub use turns::{DecisionPoint, Turn};

use crate::conversation::{Message, Role, Thread};
use crate::provider::TokenAccounter;
use stream_event::TokenUsage;

/// Which rung of the ladder a compaction pass landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompactionLevel {
    Full,
    SmartTruncation,
    SlidingWindow,
    DeepCompression,
    SessionHandoff,
}

impl CompactionLevel {
    fn for_ratio(ratio: f32) -> Self {
        if ratio < 0.50 {
            CompactionLevel::Full
        } else if ratio < 0.70 {
            CompactionLevel::SmartTruncation
        } else if ratio < 0.85 {
            CompactionLevel::SlidingWindow
        } else if ratio < 0.95 {
            CompactionLevel::DeepCompression
        } else {
            CompactionLevel::SessionHandoff
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            CompactionLevel::Full => 0,
            CompactionLevel::SmartTruncation => 1,
            CompactionLevel::SlidingWindow => 2,
            CompactionLevel::DeepCompression => 3,
            CompactionLevel::SessionHandoff => 4,
        }
    }
}

const RECENT_TURNS_L2: usize = 6;
const IMPORTANT_OLD_TURNS_L2: usize = 5;
const RECENT_TURNS_L3: usize = 2;
const IMPORTANT_THRESHOLD: f32 = 60.0;
const TOOL_MESSAGE_HEAD_TAIL_CHARS: usize = 1_000;

/// Result of one [`ContextCompactor::compact`] call.
pub struct CompactionOutcome {
    pub level: CompactionLevel,
    pub ratio: f32,
    pub messages: Vec<Message>,
    pub summary: Option<StructuredSummary>,
    pub handoff: Option<HandoffDocument>,
    pub needs_handoff: bool,
    /// Count of turns folded into `summary`/`handoff` rather than kept verbatim.
    pub compacted_turns: usize,
    pub kept_turns: usize,
}

/// Config knobs a host may override; defaults match §4.9's stated defaults.
#[derive(Debug, Clone, Copy)]
pub struct CompactorConfig {
    pub recent_turns_l2: usize,
    pub important_old_turns_l2: usize,
    pub recent_turns_l3: usize,
    pub auto_handoff: bool,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            recent_turns_l2: RECENT_TURNS_L2,
            important_old_turns_l2: IMPORTANT_OLD_TURNS_L2,
            recent_turns_l3: RECENT_TURNS_L3,
            auto_handoff: true,
        }
    }
}

pub struct ContextCompactor {
    accounter: TokenAccounter,
    config: CompactorConfig,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self::new(CompactorConfig::default())
    }
}

impl ContextCompactor {
    pub fn new(config: CompactorConfig) -> Self {
        Self {
            accounter: TokenAccounter::new(),
            config,
        }
    }

    fn ratio(&self, messages: &[Message], usage: Option<TokenUsage>, context_limit: u32) -> f32 {
        let used = match usage {
            Some(u) => u.total(),
            None => self.accounter.count_total(messages),
        };
        if context_limit == 0 {
            return 1.0;
        }
        used as f32 / context_limit as f32
    }

    /// Runs the ladder once. Reported `usage` (if any) takes priority over the
    /// local BPE estimate, matching the provider-always-wins rule in §4.1.
    pub fn compact(&self, thread: &Thread, usage: Option<TokenUsage>, context_limit: u32) -> CompactionOutcome {
        let messages = &thread.messages;
        let ratio = self.ratio(messages, usage, context_limit);
        let level = CompactionLevel::for_ratio(ratio);
        let original_tokens = self.accounter.count_total(messages);

        let outcome = match level {
            CompactionLevel::Full => CompactionOutcome {
                level,
                ratio,
                messages: messages.clone(),
                summary: None,
                handoff: None,
                needs_handoff: false,
                compacted_turns: 0,
                kept_turns: turns::group(messages).len(),
            },
            CompactionLevel::SmartTruncation => self.smart_truncation(messages, ratio),
            CompactionLevel::SlidingWindow => self.sliding_window(messages, ratio),
            CompactionLevel::DeepCompression => self.deep_compression(messages, ratio),
            CompactionLevel::SessionHandoff => {
                if self.config.auto_handoff {
                    self.session_handoff(thread, ratio)
                } else {
                    self.deep_compression(messages, ratio)
                }
            }
        };

        debug_assert!(self.accounter.count_total(&outcome.messages) <= original_tokens.max(1));
        outcome
    }

    /// Pruning pass (§4.9, §4.11 step 4): marks every message in `thread` that
    /// `outcome` dropped with `compacted_at`, so it no longer counts toward the
    /// next call's budget but stays in the store for UI history.
    pub fn mark_pruned(&self, thread: &mut Thread, outcome: &CompactionOutcome, now_ms: i64) {
        if outcome.level == CompactionLevel::Full {
            return;
        }
        let kept_ids: std::collections::HashSet<&str> = outcome.messages.iter().map(|m| m.id.as_str()).collect();
        for message in thread.messages.iter_mut() {
            if !kept_ids.contains(message.id.as_str()) && message.compacted_at.is_none() {
                message.compacted_at = Some(now_ms);
            }
        }
    }

    /// L1: truncate every Tool message's content via the head/tail rule, keep
    /// everything else untouched.
    fn smart_truncation(&self, messages: &[Message], ratio: f32) -> CompactionOutcome {
        let truncated: Vec<Message> = messages
            .iter()
            .map(|m| {
                if m.role == Role::Tool {
                    let mut m = m.clone();
                    m.content = head_tail_truncate(&m.content, TOOL_MESSAGE_HEAD_TAIL_CHARS);
                    m
                } else {
                    m.clone()
                }
            })
            .collect();

        CompactionOutcome {
            level: CompactionLevel::SmartTruncation,
            ratio,
            messages: truncated,
            summary: None,
            handoff: None,
            needs_handoff: false,
            compacted_turns: 0,
            kept_turns: turns::group(messages).len(),
        }
    }

    /// L2: keep the N most recent turns plus up to M important old ones;
    /// summarize everything else dropped.
    fn sliding_window(&self, messages: &[Message], ratio: f32) -> CompactionOutcome {
        let all_turns = turns::group(messages);
        let total = all_turns.len();
        let recent_start = total.saturating_sub(self.config.recent_turns_l2);

        let mut kept_indices: Vec<usize> = (recent_start..total).collect();

        let mut old_by_importance: Vec<usize> = (0..recent_start)
            .filter(|i| all_turns[*i].importance >= IMPORTANT_THRESHOLD || all_turns[*i].has_write_ops || all_turns[*i].has_errors)
            .collect();
        old_by_importance.sort_by(|a, b| all_turns[*b].importance.partial_cmp(&all_turns[*a].importance).unwrap());
        old_by_importance.truncate(self.config.important_old_turns_l2);

        kept_indices.extend(old_by_importance);
        kept_indices.sort_unstable();
        kept_indices.dedup();

        let mut outcome = self.build_with_summary(messages, &all_turns, &kept_indices, false);
        outcome.ratio = ratio;
        outcome
    }

    /// L3: keep only the last K turns; regenerate a full (verbose) summary from
    /// everything older.
    fn deep_compression(&self, messages: &[Message], ratio: f32) -> CompactionOutcome {
        let all_turns = turns::group(messages);
        let total = all_turns.len();
        let recent_start = total.saturating_sub(self.config.recent_turns_l3);
        let kept_indices: Vec<usize> = (recent_start..total).collect();

        let mut outcome = self.build_with_summary(messages, &all_turns, &kept_indices, true);
        outcome.level = CompactionLevel::DeepCompression;
        outcome.ratio = ratio;
        outcome
    }

    fn build_with_summary(
        &self,
        messages: &[Message],
        all_turns: &[Turn],
        kept_indices: &[usize],
        verbose: bool,
    ) -> CompactionOutcome {
        let kept_set: std::collections::HashSet<usize> = kept_indices.iter().copied().collect();
        let dropped: Vec<&Turn> = all_turns.iter().enumerate().filter(|(i, _)| !kept_set.contains(i)).map(|(_, t)| t).collect();

        let summary = if dropped.is_empty() {
            None
        } else {
            Some(summary::build_structured_summary(messages, &dropped, verbose))
        };

        let mut out_messages = Vec::new();
        for &idx in kept_indices {
            for &msg_idx in &all_turns[idx].message_indices {
                let mut m = messages[msg_idx].clone();
                if m.role == Role::Tool {
                    m.content = head_tail_truncate(&m.content, TOOL_MESSAGE_HEAD_TAIL_CHARS);
                }
                out_messages.push(m);
            }
        }

        CompactionOutcome {
            level: CompactionLevel::SlidingWindow,
            ratio: 0.0,
            messages: out_messages,
            summary,
            handoff: None,
            needs_handoff: false,
            compacted_turns: dropped.len(),
            kept_turns: kept_indices.len(),
        }
    }

    /// L4: generate a handoff document and collapse the whole thread to
    /// system-prompt + handoff narrative + last user/assistant turn.
    fn session_handoff(&self, thread: &Thread, ratio: f32) -> CompactionOutcome {
        let messages = &thread.messages;
        let all_turns = turns::group(messages);
        let handoff = summary::build_handoff_document(messages, &all_turns);

        let last_turn_messages: Vec<Message> = all_turns
            .last()
            .map(|t| t.message_indices.iter().map(|&i| messages[i].clone()).collect())
            .unwrap_or_default();

        let mut out = Vec::new();
        out.extend(last_turn_messages);

        CompactionOutcome {
            level: CompactionLevel::SessionHandoff,
            ratio,
            messages: out,
            summary: Some(handoff.summary.clone()),
            handoff: Some(handoff),
            needs_handoff: true,
            compacted_turns: all_turns.len().saturating_sub(1),
            kept_turns: 1,
        }
    }
}

/// Head/tail truncation with an omission marker, same shape as the dispatcher's
/// tool-result truncation (kept separate: this one works on already-stored
/// `Message.content`, not a fresh tool result).
fn head_tail_truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let half = limit / 2;
    format!("{}\n... (truncated) ...\n{}", &text[..half], &text[text.len() - half..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Message, ToolCall, ToolCallStatus};

    fn thread_with_turns(n: usize) -> Thread {
        let mut thread = Thread::new("t1", 0);
        for i in 0..n {
            thread.push(Message::user(format!("request {i}")), i as i64);
            thread.push(Message::assistant(format!("response {i}")), i as i64);
        }
        thread
    }

    #[test]
    fn low_ratio_passes_through_untouched() {
        let compactor = ContextCompactor::default();
        let thread = thread_with_turns(3);
        let outcome = compactor.compact(&thread, Some(TokenUsage { prompt_tokens: 10, completion_tokens: 10, cached_tokens: 0 }), 1_000_000);
        assert_eq!(outcome.level, CompactionLevel::Full);
        assert_eq!(outcome.messages.len(), thread.messages.len());
    }

    #[test]
    fn high_ratio_triggers_session_handoff_with_needs_handoff() {
        let compactor = ContextCompactor::default();
        let thread = thread_with_turns(20);
        let outcome = compactor.compact(&thread, Some(TokenUsage { prompt_tokens: 960, completion_tokens: 0, cached_tokens: 0 }), 1_000);
        assert_eq!(outcome.level, CompactionLevel::SessionHandoff);
        assert!(outcome.needs_handoff);
        assert!(outcome.handoff.is_some());
    }

    #[test]
    fn disabling_auto_handoff_falls_back_to_deep_compression() {
        let config = CompactorConfig {
            auto_handoff: false,
            ..CompactorConfig::default()
        };
        let compactor = ContextCompactor::new(config);
        let thread = thread_with_turns(20);
        let outcome = compactor.compact(&thread, Some(TokenUsage { prompt_tokens: 960, completion_tokens: 0, cached_tokens: 0 }), 1_000);
        assert_eq!(outcome.level, CompactionLevel::DeepCompression);
        assert!(!outcome.needs_handoff);
    }

    #[test]
    fn sliding_window_keeps_recent_turns_and_summarizes_the_rest() {
        let compactor = ContextCompactor::default();
        let mut thread = thread_with_turns(15);
        // push a write-op tool call early so it counts as "important old".
        let mut assistant = Message::assistant("editing");
        assistant.tool_calls.push({
            let mut tc = ToolCall::new("call_1", "write_file", serde_json::json!({"path": "a.rs", "content": "x"}));
            tc.status = ToolCallStatus::Completed;
            tc
        });
        thread.messages.insert(2, assistant);

        let outcome = compactor.compact(&thread, Some(TokenUsage { prompt_tokens: 760, completion_tokens: 0, cached_tokens: 0 }), 1_000);
        assert_eq!(outcome.level, CompactionLevel::SlidingWindow);
        assert!(outcome.summary.is_some());
        assert!(outcome.kept_turns <= RECENT_TURNS_L2 + IMPORTANT_OLD_TURNS_L2);
        assert!((outcome.ratio - 0.76).abs() < 1e-6);
    }

    #[test]
    fn every_level_never_increases_token_count() {
        let compactor = ContextCompactor::default();
        let thread = thread_with_turns(20);
        for context_limit in [1_000_000u32, 1_300, 1_150, 1_050, 980] {
            let outcome = compactor.compact(&thread, None, context_limit);
            let accounter = TokenAccounter::new();
            assert!(accounter.count_total(&outcome.messages) <= accounter.count_total(&thread.messages));
        }
    }
}

//! StructuredSummary and HandoffDocument (§4.9): the non-LLM "quick" summary
//! built purely from turn groupings, and the narrative handed off at L4.

use crate::conversation::{Message, Role};

use super::turns::Turn;

const CAP_COMPLETED_STEPS: usize = 30;
const CAP_PENDING_STEPS: usize = 30;
const CAP_DECISIONS: usize = 15;
const CAP_FILE_CHANGES: usize = 30;
const CAP_ERRORS_AND_FIXES: usize = 10;
const CAP_USER_INSTRUCTIONS: usize = 10;

/// Per-path history folded to a single line (create -> modify -> delete
/// sequences collapse into one summary rather than one entry per edit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeRecord {
    pub path: String,
    pub history: String,
}

/// `{objective, completedSteps, pendingSteps, decisions, fileChanges,
/// errorsAndFixes, userInstructions, generatedAt, turnRange}` from §4.9.
#[derive(Debug, Clone)]
pub struct StructuredSummary {
    pub objective: String,
    pub completed_steps: Vec<String>,
    pub pending_steps: Vec<String>,
    pub decisions: Vec<String>,
    pub file_changes: Vec<FileChangeRecord>,
    pub errors_and_fixes: Vec<String>,
    pub user_instructions: Vec<String>,
    pub generated_at: i64,
    pub turn_range: (usize, usize),
}

impl StructuredSummary {
    /// Merges `other` into `self` monotonically: the turn range only ever
    /// grows, and every array field deduplicates and re-caps afterward.
    pub fn merge(mut self, other: StructuredSummary) -> StructuredSummary {
        self.turn_range = (self.turn_range.0.min(other.turn_range.0), self.turn_range.1.max(other.turn_range.1));
        self.completed_steps = dedup_cap(self.completed_steps, other.completed_steps, CAP_COMPLETED_STEPS);
        self.pending_steps = dedup_cap(self.pending_steps, other.pending_steps, CAP_PENDING_STEPS);
        self.decisions = dedup_cap(self.decisions, other.decisions, CAP_DECISIONS);
        self.errors_and_fixes = dedup_cap(self.errors_and_fixes, other.errors_and_fixes, CAP_ERRORS_AND_FIXES);
        self.user_instructions = dedup_cap(self.user_instructions, other.user_instructions, CAP_USER_INSTRUCTIONS);

        let mut merged_files: Vec<FileChangeRecord> = self.file_changes;
        for incoming in other.file_changes {
            match merged_files.iter_mut().find(|f| f.path == incoming.path) {
                Some(existing) => existing.history = format!("{} -> {}", existing.history, incoming.history),
                None => merged_files.push(incoming),
            }
        }
        merged_files.truncate(CAP_FILE_CHANGES);
        self.file_changes = merged_files;
        self.generated_at = self.generated_at.max(other.generated_at);
        self
    }
}

fn dedup_cap(mut base: Vec<String>, extra: Vec<String>, cap: usize) -> Vec<String> {
    for item in extra {
        if !base.contains(&item) {
            base.push(item);
        }
    }
    base.truncate(cap);
    base
}

/// A continuation narrative for a brand-new thread after a session handoff.
#[derive(Debug, Clone)]
pub struct HandoffDocument {
    pub summary: StructuredSummary,
    pub last_user_request: String,
    pub open_files: Vec<String>,
    pub next_steps: String,
    pub generated_at: i64,
}

impl HandoffDocument {
    /// Rendered as a system-prompt prefix, per §4.9: "explicit 'This is a
    /// continuation of a previous session' banner."
    pub fn render(&self) -> String {
        let mut out = String::from("This is a continuation of a previous session.\n\n");
        out.push_str(&format!("Objective: {}\n", self.summary.objective));
        if !self.summary.completed_steps.is_empty() {
            out.push_str(&format!("Completed so far:\n- {}\n", self.summary.completed_steps.join("\n- ")));
        }
        if !self.open_files.is_empty() {
            out.push_str(&format!("Open files: {}\n", self.open_files.join(", ")));
        }
        out.push_str(&format!("Last request: {}\n", self.last_user_request));
        out.push_str(&format!("Next steps: {}\n", self.next_steps));
        out
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Builds the quick, non-LLM summary over a run of dropped turns.
pub fn build_structured_summary(messages: &[Message], dropped: &[&Turn], verbose: bool) -> StructuredSummary {
    let objective = dropped
        .iter()
        .flat_map(|t| t.message_indices.iter())
        .filter_map(|&i| (messages[i].role == Role::User).then(|| messages[i].content.clone()))
        .next()
        .unwrap_or_else(|| "(no objective captured)".to_string());

    let mut completed_steps = Vec::new();
    let mut user_instructions = Vec::new();
    let mut errors_and_fixes = Vec::new();
    let mut decisions = Vec::new();
    let mut file_history: Vec<FileChangeRecord> = Vec::new();

    for turn in dropped {
        for &i in &turn.message_indices {
            let message = &messages[i];
            match message.role {
                Role::User => user_instructions.push(truncate_line(&message.content, if verbose { 200 } else { 100 })),
                Role::Assistant if !message.content.is_empty() => {
                    completed_steps.push(truncate_line(&message.content, if verbose { 200 } else { 100 }))
                }
                Role::Tool if message.content.starts_with("Error:") => {
                    errors_and_fixes.push(truncate_line(&message.content, 150))
                }
                _ => {}
            }
        }
        for decision in &turn.decision_points {
            decisions.push(decision.description.clone());
            for path in &decision.files {
                match file_history.iter_mut().find(|f| &f.path == path) {
                    Some(existing) => existing.history = format!("{} -> {}", existing.history, decision.kind),
                    None => file_history.push(FileChangeRecord {
                        path: path.clone(),
                        history: decision.kind.clone(),
                    }),
                }
            }
        }
    }

    let turn_indices: Vec<usize> = dropped.iter().map(|t| t.message_indices[0]).collect();
    let from = turn_indices.iter().copied().min().unwrap_or(0);
    let to = turn_indices.iter().copied().max().unwrap_or(0);

    StructuredSummary {
        objective,
        completed_steps: cap(completed_steps, CAP_COMPLETED_STEPS),
        pending_steps: cap(Vec::new(), CAP_PENDING_STEPS),
        decisions: cap(decisions, CAP_DECISIONS),
        file_changes: cap(file_history, CAP_FILE_CHANGES),
        errors_and_fixes: cap(errors_and_fixes, CAP_ERRORS_AND_FIXES),
        user_instructions: cap(user_instructions, CAP_USER_INSTRUCTIONS),
        generated_at: now_ms(),
        turn_range: (from, to),
    }
}

fn cap<T>(mut v: Vec<T>, n: usize) -> Vec<T> {
    v.truncate(n);
    v
}

fn truncate_line(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

/// Builds the L4 handoff: a verbose summary over every turn but the last, plus
/// the last user request and the set of files touched anywhere in the thread.
pub fn build_handoff_document(messages: &[Message], all_turns: &[Turn]) -> HandoffDocument {
    let (history, last) = all_turns.split_at(all_turns.len().saturating_sub(1));
    let history_refs: Vec<&Turn> = history.iter().collect();
    let summary = build_structured_summary(messages, &history_refs, true);

    let last_user_request = last
        .first()
        .and_then(|t| t.message_indices.iter().find(|&&i| messages[i].role == Role::User))
        .map(|&i| messages[i].content.clone())
        .unwrap_or_default();

    let open_files: Vec<String> = summary.file_changes.iter().map(|f| f.path.clone()).collect();

    HandoffDocument {
        next_steps: if summary.decisions.is_empty() {
            "Continue the task described in the objective.".to_string()
        } else {
            format!("Continue from: {}", summary.decisions.last().unwrap())
        },
        summary,
        last_user_request,
        open_files,
        generated_at: now_ms(),
    }
}

//! Turn grouping and importance scoring (§4.9): a turn is one User message plus
//! everything the assistant did in response to it, up to (not including) the
//! next User message.

use crate::conversation::{Message, Role, ToolCallStatus};

const ROLE_WEIGHT_USER: f32 = 30.0;
const ROLE_WEIGHT_ASSISTANT_WITH_TOOLS: f32 = 25.0;
const ROLE_WEIGHT_ASSISTANT_TEXT: f32 = 15.0;
const ROLE_WEIGHT_TOOL: f32 = 10.0;

const BONUS_WRITE_OP: f32 = 35.0;
const BONUS_DELETE: f32 = 45.0;
const BONUS_ERROR_TOOL_RESULT: f32 = 40.0;

const STRUCTURAL_BONUS_HAS_WRITE: f32 = 20.0;
const STRUCTURAL_BONUS_HAS_ERRORS: f32 = 30.0;
const STRUCTURAL_BONUS_RECENT: f32 = 20.0;
const RECENT_FRACTION: f32 = 0.30;

/// For every assistant tool-call that creates, modifies, or deletes a file: a
/// record of what happened, for the compactor's structured summary.
#[derive(Debug, Clone)]
pub struct DecisionPoint {
    pub turn_index: usize,
    pub kind: String,
    pub description: String,
    pub files: Vec<String>,
}

const WRITE_TOOL_NAMES: &[&str] = &["write_file", "create_file_or_folder", "edit", "multiedit", "apply_patch", "replace_file_content"];
const DELETE_TOOL_NAMES: &[&str] = &["delete_file_or_folder"];

/// One User message and everything attached to it up to the next User message.
#[derive(Debug, Clone)]
pub struct Turn {
    pub message_indices: Vec<usize>,
    pub importance: f32,
    pub has_write_ops: bool,
    pub has_errors: bool,
    pub decision_points: Vec<DecisionPoint>,
}

fn role_weight(message: &Message) -> f32 {
    match message.role {
        Role::User => ROLE_WEIGHT_USER,
        Role::Assistant if !message.tool_calls.is_empty() => ROLE_WEIGHT_ASSISTANT_WITH_TOOLS,
        Role::Assistant => ROLE_WEIGHT_ASSISTANT_TEXT,
        Role::Tool => ROLE_WEIGHT_TOOL,
        Role::System => 0.0,
    }
}

fn tool_call_bonus(message: &Message) -> f32 {
    let mut bonus = 0.0;
    for call in &message.tool_calls {
        if DELETE_TOOL_NAMES.contains(&call.name.as_str()) {
            bonus += BONUS_DELETE;
        } else if WRITE_TOOL_NAMES.contains(&call.name.as_str()) {
            bonus += BONUS_WRITE_OP;
        }
        if call.status == ToolCallStatus::Failed {
            bonus += BONUS_ERROR_TOOL_RESULT;
        }
    }
    bonus
}

fn message_has_error(message: &Message) -> bool {
    message.role == Role::Tool && message.tool_call_id.is_some() && message.content.starts_with("Error:")
}

/// Groups `messages` into [`Turn`]s and scores each one's importance.
pub fn group(messages: &[Message]) -> Vec<Turn> {
    let mut turns: Vec<Vec<usize>> = Vec::new();
    for (i, message) in messages.iter().enumerate() {
        if message.role == Role::User || turns.is_empty() {
            turns.push(vec![i]);
        } else {
            turns.last_mut().unwrap().push(i);
        }
    }

    let total = turns.len();
    turns
        .into_iter()
        .enumerate()
        .map(|(turn_index, indices)| score_turn(messages, indices, turn_index, total))
        .collect()
}

fn score_turn(messages: &[Message], indices: Vec<usize>, turn_index: usize, total_turns: usize) -> Turn {
    let mut weighted_sum = 0.0;
    let mut bonus_sum = 0.0;
    let mut has_write_ops = false;
    let mut has_errors = false;
    let mut decision_points = Vec::new();

    for &i in &indices {
        let message = &messages[i];
        weighted_sum += role_weight(message);
        bonus_sum += tool_call_bonus(message);

        for call in &message.tool_calls {
            let is_delete = DELETE_TOOL_NAMES.contains(&call.name.as_str());
            let is_write = WRITE_TOOL_NAMES.contains(&call.name.as_str());
            if is_delete || is_write {
                has_write_ops = true;
                let files = call
                    .arguments
                    .get("path")
                    .and_then(|v| v.as_str())
                    .map(|s| vec![s.to_string()])
                    .unwrap_or_default();
                decision_points.push(DecisionPoint {
                    turn_index,
                    kind: if is_delete { "delete".to_string() } else { "modify".to_string() },
                    description: format!("{} via {}", if is_delete { "deleted" } else { "modified" }, call.name),
                    files,
                });
            }
            if call.status == ToolCallStatus::Failed {
                has_errors = true;
            }
        }
        if message_has_error(message) {
            has_errors = true;
        }
    }

    let mut importance = weighted_sum / indices.len().max(1) as f32;
    importance += bonus_sum;
    if has_write_ops {
        importance += STRUCTURAL_BONUS_HAS_WRITE;
    }
    if has_errors {
        importance += STRUCTURAL_BONUS_HAS_ERRORS;
    }
    if total_turns > 0 && turn_index as f32 >= (total_turns as f32) * (1.0 - RECENT_FRACTION) {
        importance += STRUCTURAL_BONUS_RECENT;
    }

    Turn {
        message_indices: indices,
        importance,
        has_write_ops,
        has_errors,
        decision_points,
    }
}

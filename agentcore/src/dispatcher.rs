//! ToolDispatcher (§4.8): takes one LLM iteration's tool calls and drives them
//! to completion — snapshotting touched files for undo, running independent
//! calls concurrently up to a CPU-scaled limit, running approval-gated calls
//! one at a time, and writing normalized `Role::Tool` messages back.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalOutcome};
use crate::conversation::{Message, ToolCall, ToolCallStatus};
use crate::tool_source::{ApprovalType, ToolCategory, ToolSource, ToolSourceError, ToolSpec};
use crate::tools::file::resolve_path_under;

const DEFAULT_MAX_RESULT_CHARS: usize = 10_000;
const ERROR_BUDGET_MULTIPLIER: f64 = 1.5;
const MIN_CONCURRENCY: usize = 2;
const MAX_CONCURRENCY: usize = 16;
const CPU_MULTIPLIER: f64 = 2.0;

/// Best-effort per-path change summary for an external diff viewer (§4.8 step 7).
/// Line counts come from a multiset comparison, not a real diff — good enough for
/// a UI badge, not for anything that needs to render a patch.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub file_path: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub lines_added: usize,
    pub lines_removed: usize,
}

/// Everything the dispatcher produced from one batch of tool calls.
pub struct DispatchOutcome {
    /// `Role::Tool` messages, one per input call, in input order.
    pub tool_messages: Vec<Message>,
    /// The input calls with `status`/`result_text`/`error` filled in.
    pub tool_calls: Vec<ToolCall>,
    /// Path -> content immediately before this batch's first touch, for the caller
    /// to merge into the active `Checkpoint.snapshots`.
    pub snapshots: HashMap<String, Option<String>>,
    pub pending_changes: Vec<FileChange>,
    /// Set when any tool result looked like `{"waitingForUser": true, ...}`; the
    /// agent loop should stop issuing further iterations until the user responds.
    pub interactive_halt: bool,
    /// Set when any call was rejected by the user (not just skipped as a dependent).
    pub user_rejected: bool,
}

fn concurrency_limit() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    ((cpus as f64 * CPU_MULTIPLIER).floor() as usize).clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

fn max_result_chars(tool_name: &str) -> usize {
    match tool_name {
        "run_command" => 30_000,
        "read_file" | "read" => 50_000,
        _ => DEFAULT_MAX_RESULT_CHARS,
    }
}

/// Head/tail truncation preserving both ends, matching `RunCommandTool`'s own rule.
/// Errors (`Error:`/`❌`-prefixed) get `ERROR_BUDGET_MULTIPLIER` extra budget so
/// diagnostics are more likely to survive whole.
fn truncate_result(text: &str, tool_name: &str, is_error: bool) -> String {
    let mut limit = max_result_chars(tool_name);
    if is_error {
        limit = (limit as f64 * ERROR_BUDGET_MULTIPLIER) as usize;
    }
    if text.len() <= limit {
        return text.to_string();
    }
    let half = limit / 2;
    let head = &text[..half];
    let tail = &text[text.len() - half..];
    format!("{head}\n... (truncated) ...\n{tail}")
}

fn is_write_class(category: ToolCategory) -> bool {
    matches!(category, ToolCategory::Write | ToolCategory::Delete)
}

fn extract_path(args: &serde_json::Value) -> Option<String> {
    args.get("path").and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// True if a successful tool result looks like `{"waitingForUser": true, ...}`.
/// `ToolCallContent` is text-only, so an interactive tool signals this by
/// returning a JSON object as its text rather than through a dedicated field.
fn is_waiting_for_user(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("waitingForUser").and_then(|w| w.as_bool()))
        .unwrap_or(false)
}

fn line_multiset_diff(old: &str, new: &str) -> (usize, usize) {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for line in old.lines() {
        *counts.entry(line).or_insert(0) -= 1;
    }
    for line in new.lines() {
        *counts.entry(line).or_insert(0) += 1;
    }
    let mut added = 0usize;
    let mut removed = 0usize;
    for count in counts.values() {
        if *count > 0 {
            added += *count as usize;
        } else {
            removed += (-*count) as usize;
        }
    }
    (added, removed)
}

struct ExecResult {
    status: ToolCallStatus,
    result_text: Option<String>,
    error: Option<String>,
}

/// Drives one batch of tool calls to completion per §4.8.
pub struct ToolDispatcher {
    source: Arc<dyn ToolSource>,
    approval_gate: Arc<ApprovalGate>,
    working_folder: Arc<PathBuf>,
    /// `toolDependencies[name].dependsOn` from config: explicit ordering edges on
    /// top of the implicit same-path write ordering.
    explicit_dependencies: HashMap<String, Vec<String>>,
}

impl ToolDispatcher {
    pub fn new(source: Arc<dyn ToolSource>, approval_gate: Arc<ApprovalGate>, working_folder: Arc<PathBuf>) -> Self {
        Self {
            source,
            approval_gate,
            working_folder,
            explicit_dependencies: HashMap::new(),
        }
    }

    pub fn with_explicit_dependencies(mut self, deps: HashMap<String, Vec<String>>) -> Self {
        self.explicit_dependencies = deps;
        self
    }

    /// Reads a tool call's proposed content for idempotent-write tracking, if it's
    /// a write call with inline content (i.e. `write_file`/`create_file_or_folder`,
    /// not `edit`/`multiedit` which describe a diff rather than final content).
    pub fn inline_write_content(call: &ToolCall) -> Option<(String, String)> {
        if !matches!(call.name.as_str(), "write_file" | "create_file_or_folder") {
            return None;
        }
        let path = extract_path(&call.arguments)?;
        let content = call.arguments.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
        Some((path, content))
    }

    async fn specs_by_name(&self) -> Result<HashMap<String, ToolSpec>, ToolSourceError> {
        let specs = self.source.list_tools().await?;
        Ok(specs.into_iter().map(|s| (s.name.clone(), s)).collect())
    }

    /// Step 1: records pre-existing content for every path a write/delete call in
    /// this batch touches, the first time (only) it's touched.
    fn snapshot_phase(&self, tool_calls: &[ToolCall], specs: &HashMap<String, ToolSpec>) -> HashMap<String, Option<String>> {
        let mut snapshots = HashMap::new();
        for call in tool_calls {
            let Some(spec) = specs.get(&call.name) else { continue };
            if !is_write_class(spec.category) {
                continue;
            }
            let Some(path) = extract_path(&call.arguments) else { continue };
            if snapshots.contains_key(&path) {
                continue;
            }
            let content = match resolve_path_under(self.working_folder.as_ref(), &path) {
                Ok(resolved) => std::fs::read_to_string(&resolved).ok(),
                Err(_) => None,
            };
            snapshots.insert(path, content);
        }
        snapshots
    }

    /// Step 2: builds `index -> set of indices it depends on`.
    fn dependency_graph(&self, tool_calls: &[ToolCall]) -> Vec<HashSet<usize>> {
        let mut deps: Vec<HashSet<usize>> = vec![HashSet::new(); tool_calls.len()];

        // implicit: same-path write ordering, earlier index precedes later.
        let mut last_writer_for_path: HashMap<String, usize> = HashMap::new();
        for (i, call) in tool_calls.iter().enumerate() {
            if let Some(path) = extract_path(&call.arguments) {
                if let Some(&prev) = last_writer_for_path.get(&path) {
                    deps[i].insert(prev);
                }
                last_writer_for_path.insert(path, i);
            }
        }

        // explicit: toolDependencies[name].dependsOn, resolved against any earlier
        // call of the named tool in this batch.
        for (i, call) in tool_calls.iter().enumerate() {
            let Some(depends_on) = self.explicit_dependencies.get(&call.name) else { continue };
            for dep_name in depends_on {
                for (j, other) in tool_calls.iter().enumerate().take(i) {
                    if &other.name == dep_name {
                        deps[i].insert(j);
                    }
                }
            }
        }

        deps
    }

    async fn execute_one(&self, call: &ToolCall) -> ExecResult {
        match self.source.call_tool(&call.name, call.arguments.clone()).await {
            Ok(content) => ExecResult {
                status: ToolCallStatus::Completed,
                result_text: Some(content.text),
                error: None,
            },
            Err(err) => ExecResult {
                status: ToolCallStatus::Failed,
                result_text: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Runs one batch of tool calls to completion, honoring dependencies,
    /// approvals, and the concurrency pool, and returns normalized results.
    pub async fn dispatch(&self, thread_id: &str, tool_calls: &[ToolCall]) -> Result<DispatchOutcome, ToolSourceError> {
        let specs = self.specs_by_name().await?;
        let snapshots = self.snapshot_phase(tool_calls, &specs);
        let deps = self.dependency_graph(tool_calls);

        let mut results: HashMap<usize, ExecResult> = HashMap::new();
        let mut remaining: HashSet<usize> = (0..tool_calls.len()).collect();
        let limit = concurrency_limit();

        while !remaining.is_empty() {
            let ready: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|i| deps[*i].iter().all(|d| results.contains_key(d)))
                .collect();

            if ready.is_empty() {
                // Unsatisfiable cycle or an unresolved dependency on a call that was
                // never reached; mark everything left as a dependency failure.
                for i in remaining.drain() {
                    results.insert(
                        i,
                        ExecResult {
                            status: ToolCallStatus::Failed,
                            result_text: None,
                            error: Some("dependency not met".to_string()),
                        },
                    );
                }
                break;
            }

            let (no_approval, approval_required): (Vec<usize>, Vec<usize>) = ready.into_iter().partition(|i| {
                specs
                    .get(&tool_calls[*i].name)
                    .map(|s| s.approval_type == ApprovalType::None)
                    .unwrap_or(true)
            });

            if !no_approval.is_empty() {
                let semaphore = Arc::new(Semaphore::new(limit));
                let mut join_set = JoinSet::new();
                for i in no_approval {
                    let call = tool_calls[i].clone();
                    let permit = semaphore.clone();
                    let source = self.source.clone();
                    join_set.spawn(async move {
                        let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                        let outcome = source.call_tool(&call.name, call.arguments.clone()).await;
                        (i, outcome)
                    });
                }
                while let Some(joined) = join_set.join_next().await {
                    let (i, outcome) = joined.expect("tool execution task panicked");
                    let exec = match outcome {
                        Ok(content) => ExecResult {
                            status: ToolCallStatus::Completed,
                            result_text: Some(content.text),
                            error: None,
                        },
                        Err(err) => ExecResult {
                            status: ToolCallStatus::Failed,
                            result_text: None,
                            error: Some(err.to_string()),
                        },
                    };
                    results.insert(i, exec);
                    remaining.remove(&i);
                }
            }

            for i in approval_required {
                let call = &tool_calls[i];
                let spec = specs.get(&call.name);
                let approval_type = spec.map(|s| s.approval_type).unwrap_or(ApprovalType::None);

                let outcome = self.approval_gate.request(thread_id, approval_type).await;
                let exec = match outcome {
                    Ok(ApprovalOutcome::Approved) => self.execute_one(call).await,
                    Ok(ApprovalOutcome::Rejected) | Err(_) => ExecResult {
                        status: ToolCallStatus::Denied,
                        result_text: None,
                        error: Some("Rejected by user".to_string()),
                    },
                };
                results.insert(i, exec);
                remaining.remove(&i);
            }
        }

        self.finalize(tool_calls, &specs, results, snapshots)
    }

    /// Resolves the approval gate for a thread's one pending request. A thin
    /// pass-through so callers (a UI handler) don't need to depend on `approval`
    /// directly, just the dispatcher they're already holding.
    pub fn resolve_approval(&self, thread_id: &str, decision: ApprovalDecision) -> Result<(), crate::approval::ApprovalError> {
        self.approval_gate.resolve(thread_id, decision)
    }

    fn finalize(
        &self,
        tool_calls: &[ToolCall],
        specs: &HashMap<String, ToolSpec>,
        mut results: HashMap<usize, ExecResult>,
        snapshots: HashMap<String, Option<String>>,
    ) -> Result<DispatchOutcome, ToolSourceError> {
        let mut tool_messages = Vec::with_capacity(tool_calls.len());
        let mut out_calls = Vec::with_capacity(tool_calls.len());
        let mut pending_changes = Vec::new();
        let mut interactive_halt = false;
        let mut user_rejected = false;

        for (i, call) in tool_calls.iter().enumerate() {
            let exec = results.remove(&i).unwrap_or(ExecResult {
                status: ToolCallStatus::Failed,
                result_text: None,
                error: Some("dependency not met".to_string()),
            });

            let mut call = call.clone();
            call.status = exec.status;

            let raw_text = match (&exec.result_text, &exec.error) {
                (Some(text), _) => text.clone(),
                (None, Some(err)) => format!("Error: {err}"),
                (None, None) => String::new(),
            };
            let is_error = exec.error.is_some();
            let truncated = truncate_result(&raw_text, &call.name, is_error);

            call.result_text = Some(truncated.clone());
            call.error = exec.error.clone();

            if exec.status == ToolCallStatus::Denied {
                user_rejected = true;
            }
            if exec.status == ToolCallStatus::Completed && is_waiting_for_user(&raw_text) {
                interactive_halt = true;
            }

            if exec.status == ToolCallStatus::Completed {
                if let Some(spec) = specs.get(&call.name) {
                    if is_write_class(spec.category) {
                        if let Some(path) = extract_path(&call.arguments) {
                            let old_content = snapshots.get(&path).cloned().flatten();
                            let new_content = match resolve_path_under(self.working_folder.as_ref(), &path) {
                                Ok(resolved) => std::fs::read_to_string(&resolved).ok(),
                                Err(_) => None,
                            };
                            let (added, removed) =
                                line_multiset_diff(old_content.as_deref().unwrap_or(""), new_content.as_deref().unwrap_or(""));
                            pending_changes.push(FileChange {
                                file_path: path,
                                old_content,
                                new_content,
                                lines_added: added,
                                lines_removed: removed,
                            });
                        }
                    }
                }
            }

            tool_messages.push(Message::tool_result_for_call(&call, truncated));
            out_calls.push(call);
        }

        Ok(DispatchOutcome {
            tool_messages,
            tool_calls: out_calls,
            snapshots,
            pending_changes,
            interactive_halt,
            user_rejected,
        })
    }
}

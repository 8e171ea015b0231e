//! AgentLoop (§4.11): the top-level controller that drives one `send`
//! invocation — calling the provider, streaming events into the thread,
//! compacting context, dispatching tool calls, and deciding when to stop.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashSet;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stream_event::{Envelope, EnvelopeState, StreamEvent};

use crate::approval::ApprovalGate;
use crate::compress::ContextCompactor;
use crate::conversation::{Message, Role, Thread, ToolCall as CoreToolCall, ToolCallStatus};
use crate::dispatcher::ToolDispatcher;
use crate::error::AgentError;
use crate::event_bus::EventBus;
use crate::loop_detector::LoopDetector;
use crate::provider::{extract_xml_tool_calls, strip_xml_tool_calls, ChatRequest, Provider};
use crate::tool_source::{ToolSource, ToolSpec};
use crate::tools::HostFacade;

const DEFAULT_MAX_TOOL_LOOPS: u32 = 25;
const MAX_LINT_ERRORS_INJECTED: usize = 3;
const PLAN_REMINDER: &str = "You modified files this turn but did not call `update_plan`. \
Use `update_plan` to record progress before continuing.";

/// Which mode a thread's turn is running under (§4.11 `ExecutionContext.chatMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Text only; no tool calls are offered to the provider and none are run.
    Chat,
    Agent,
    /// Like `Agent`, but nags the model to keep its `Plan` current.
    Plan,
}

/// Per-invocation context (§4.11 `ExecutionContext`).
pub struct ExecutionContext {
    pub thread_id: String,
    pub chat_mode: ChatMode,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(thread_id: impl Into<String>, chat_mode: ChatMode) -> Self {
        Self {
            thread_id: thread_id.into(),
            chat_mode,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Config knobs the host may override; defaults match §4.11's stated defaults.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub max_tool_loops: u32,
    pub enable_auto_fix: bool,
    pub system_prompt: Option<String>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_tool_loops: DEFAULT_MAX_TOOL_LOOPS,
            enable_auto_fix: true,
            system_prompt: None,
        }
    }
}

/// Why a `send` invocation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    ChatModeNoTools,
    NeedsHandoff,
    LoopDetected(String),
    InteractiveHalt,
    UserRejected,
    MaxIterations,
    Cancelled,
}

/// Sews the provider, dispatcher, loop detector, and compactor together for one
/// thread at a time (§4.11). At most one `send` per `threadId` may run
/// concurrently; `running` enforces that.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tool_source: Arc<dyn ToolSource>,
    dispatcher: ToolDispatcher,
    compactor: ContextCompactor,
    event_bus: Arc<EventBus>,
    host_facade: Option<Arc<dyn HostFacade>>,
    config: AgentLoopConfig,
    running: DashSet<String>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tool_source: Arc<dyn ToolSource>,
        approval_gate: Arc<ApprovalGate>,
        working_folder: Arc<std::path::PathBuf>,
        event_bus: Arc<EventBus>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            provider,
            tool_source: tool_source.clone(),
            dispatcher: ToolDispatcher::new(tool_source, approval_gate, working_folder),
            compactor: ContextCompactor::default(),
            event_bus,
            host_facade: None,
            config,
            running: DashSet::new(),
        }
    }

    pub fn with_host_facade(mut self, facade: Arc<dyn HostFacade>) -> Self {
        self.host_facade = Some(facade);
        self
    }

    fn publish(&self, state: &mut EnvelopeState, event: StreamEvent) {
        let envelope: Envelope = state.next(event);
        self.event_bus.publish(envelope);
    }

    /// Drives one `send` invocation to completion per §4.11's algorithm.
    pub async fn send(
        &self,
        thread: &mut Thread,
        ctx: &ExecutionContext,
        model: &str,
        context_limit: u32,
        now_ms: impl Fn() -> i64,
    ) -> Result<StopReason, AgentError> {
        if !self.running.insert(ctx.thread_id.clone()) {
            return Err(AgentError::Compaction(format!(
                "an AgentLoop is already running for thread {}",
                ctx.thread_id
            )));
        }
        let result = self.send_inner(thread, ctx, model, context_limit, &now_ms).await;
        self.running.remove(&ctx.thread_id);
        result
    }

    async fn send_inner(
        &self,
        thread: &mut Thread,
        ctx: &ExecutionContext,
        model: &str,
        context_limit: u32,
        now_ms: &impl Fn() -> i64,
    ) -> Result<StopReason, AgentError> {
        let mut envelope_state = EnvelopeState::new(ctx.thread_id.clone());
        let mut loop_detector = LoopDetector::new();
        let tool_specs: Vec<ToolSpec> = self.tool_source.list_tools().await?;

        self.publish(&mut envelope_state, StreamEvent::LoopStart);

        let mut iteration: u32 = 0;
        let mut stop_reason = StopReason::Completed;

        'outer: loop {
            if ctx.cancellation.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            if iteration >= self.config.max_tool_loops {
                warn!(thread_id = %ctx.thread_id, max = self.config.max_tool_loops, "agent loop hit max iterations");
                self.publish(
                    &mut envelope_state,
                    StreamEvent::LoopWarning {
                        reason: "max iterations".to_string(),
                    },
                );
                stop_reason = StopReason::MaxIterations;
                break;
            }
            iteration += 1;
            debug!(thread_id = %ctx.thread_id, iteration, "agent loop iteration");
            self.publish(&mut envelope_state, StreamEvent::LoopIteration { iteration });

            // step a: call the provider, streaming into a fresh assistant message.
            let mut request = ChatRequest::new(model, thread.messages.clone())
                .with_tools(if ctx.chat_mode == ChatMode::Chat { Vec::new() } else { tool_specs_as_request(&tool_specs) })
                .with_cancellation(ctx.cancellation.clone());
            if let Some(system_prompt) = &self.config.system_prompt {
                request = request.with_system_prompt(system_prompt.clone());
            }

            self.publish(&mut envelope_state, StreamEvent::LlmStart);
            let mut assistant = Message::assistant(String::new());
            let mut pending_tool_calls: Vec<CoreToolCall> = Vec::new();
            let mut usage = None;

            let stream_result = self.provider.chat(request).await;
            let mut stream = match stream_result {
                Ok(s) => s,
                Err(err) => {
                    self.publish(
                        &mut envelope_state,
                        StreamEvent::LlmError { message: err.to_string() },
                    );
                    return Err(AgentError::Provider(err));
                }
            };

            while let Some(event) = stream.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(err) => {
                        self.publish(
                            &mut envelope_state,
                            StreamEvent::LlmError { message: err.to_string() },
                        );
                        return Err(AgentError::Provider(err));
                    }
                };
                match &event {
                    StreamEvent::Text { delta } => assistant.content.push_str(delta),
                    StreamEvent::Reasoning { delta, .. } => {
                        let existing = assistant.reasoning.get_or_insert_with(String::new);
                        existing.push_str(delta);
                    }
                    StreamEvent::ToolCallEnd { tool_call } => {
                        pending_tool_calls.push(tool_call_to_core(tool_call.clone()));
                    }
                    StreamEvent::Usage { usage: u } => usage = Some(*u),
                    _ => {}
                }
                self.publish(&mut envelope_state, event);
            }
            self.publish(&mut envelope_state, StreamEvent::LlmDone);

            assistant.tool_calls = pending_tool_calls.clone();
            let assistant_content = assistant.content.clone();
            thread.push(assistant, now_ms());

            // step b: feed usage into the compactor; it may force an early handoff.
            let outcome = self.compactor.compact(thread, usage, context_limit);
            self.publish(
                &mut envelope_state,
                StreamEvent::ContextLevel {
                    level: outcome.level.as_u8(),
                    ratio: outcome.ratio,
                },
            );
            if let Some(summary) = &outcome.summary {
                self.publish(
                    &mut envelope_state,
                    StreamEvent::ContextSummary {
                        turn_from: summary.turn_range.0,
                        turn_to: summary.turn_range.1,
                    },
                );
            }
            self.compactor.mark_pruned(thread, &outcome, now_ms());
            if outcome.needs_handoff {
                self.publish(&mut envelope_state, StreamEvent::ContextHandoff);
                stop_reason = StopReason::NeedsHandoff;
                break 'outer;
            }

            // step c: chat mode never dispatches tools.
            if ctx.chat_mode == ChatMode::Chat {
                stop_reason = StopReason::ChatModeNoTools;
                break;
            }

            // step d: no tool calls arrived through the structured channel; fall
            // back to extracting any XML-form tool calls embedded in the text
            // (§4.4 — always applied when the structured set is empty).
            if pending_tool_calls.is_empty() {
                let extracted = extract_xml_tool_calls(&assistant_content);
                if !extracted.is_empty() {
                    if let Some(last) = thread.messages.last_mut() {
                        last.tool_calls = extracted.clone();
                        last.content = strip_xml_tool_calls(&assistant_content);
                    }
                    pending_tool_calls = extracted;
                }
            }

            if pending_tool_calls.is_empty() {
                if ctx.chat_mode == ChatMode::Plan && thread.plan.is_some() && turn_modified_files_without_plan_update(thread) {
                    thread.push(Message::user(PLAN_REMINDER), now_ms());
                    continue;
                }
                stop_reason = StopReason::Completed;
                break;
            }

            // step e: loop detector.
            let check = loop_detector.check(&pending_tool_calls);
            if check.is_loop {
                let reason = check.reason.unwrap_or_else(|| "repetition detected".to_string());
                warn!(thread_id = %ctx.thread_id, reason = %reason, "loop detector tripped");
                self.publish(&mut envelope_state, StreamEvent::LoopWarning { reason: reason.clone() });
                if let Some(last) = thread.messages.last_mut() {
                    last.content.push_str(&format!("\n\n[loop detector: {reason}]"));
                }
                stop_reason = StopReason::LoopDetected(reason);
                break;
            }

            // step g: hand off to the dispatcher.
            for call in &pending_tool_calls {
                self.publish(
                    &mut envelope_state,
                    StreamEvent::ToolPending {
                        id: call.id.clone(),
                        name: call.name.clone(),
                    },
                );
            }
            let dispatch_outcome = self.dispatcher.dispatch(&ctx.thread_id, &pending_tool_calls).await?;
            for call in &dispatch_outcome.tool_calls {
                match call.status {
                    ToolCallStatus::Completed => {
                        self.publish(&mut envelope_state, StreamEvent::ToolCompleted { id: call.id.clone() })
                    }
                    ToolCallStatus::Failed => self.publish(
                        &mut envelope_state,
                        StreamEvent::ToolError {
                            id: call.id.clone(),
                            message: call.error.clone().unwrap_or_default(),
                        },
                    ),
                    ToolCallStatus::Denied => {
                        self.publish(&mut envelope_state, StreamEvent::ToolRejected { id: call.id.clone() })
                    }
                    _ => {}
                }
                if let Some((path, content)) = ToolDispatcher::inline_write_content(call) {
                    if call.status == ToolCallStatus::Completed {
                        loop_detector.record_write(path, &content);
                    }
                }
            }

            if let Some(checkpoint) = thread.checkpoints.last_mut() {
                checkpoint.snapshots.extend(dispatch_outcome.snapshots.clone());
            }

            // step h: append tool-result messages, then optionally auto-fix.
            let changed_paths: Vec<String> = dispatch_outcome.pending_changes.iter().map(|c| c.file_path.clone()).collect();
            for message in dispatch_outcome.tool_messages {
                thread.push(message, now_ms());
            }

            if dispatch_outcome.interactive_halt {
                stop_reason = StopReason::InteractiveHalt;
                break;
            }

            if self.config.enable_auto_fix && !changed_paths.is_empty() {
                if let Some(facade) = &self.host_facade {
                    let mut errors = Vec::new();
                    for path in &changed_paths {
                        if let Ok(diagnostics) = facade.get_lint_errors(Some(path)).await {
                            errors.extend(diagnostics.into_iter().filter(|d| d.severity.eq_ignore_ascii_case("error")));
                        }
                    }
                    if !errors.is_empty() {
                        let listed: Vec<String> = errors
                            .iter()
                            .take(MAX_LINT_ERRORS_INJECTED)
                            .map(|d| format!("{}:{}: {}", d.path, d.line, d.message))
                            .collect();
                        thread.push(Message::user(format!("Lint errors after your last edit:\n{}", listed.join("\n"))), now_ms());
                    }
                }
            }

            // step i: a user rejection ends the turn.
            if dispatch_outcome.user_rejected {
                stop_reason = StopReason::UserRejected;
                break;
            }
        }

        self.publish(
            &mut envelope_state,
            StreamEvent::LoopEnd {
                reason: format!("{stop_reason:?}"),
            },
        );
        Ok(stop_reason)
    }
}

fn tool_call_to_core(call: stream_event::ToolCall) -> CoreToolCall {
    CoreToolCall::new(call.id, call.name, call.arguments)
}

fn tool_specs_as_request(specs: &[ToolSpec]) -> Vec<ToolSpec> {
    specs.to_vec()
}

/// Whether any assistant tool call since the last User message modified a file
/// and `update_plan` was not among this turn's calls (§4.11 step d, plan mode).
fn turn_modified_files_without_plan_update(thread: &Thread) -> bool {
    let last_turn_start = thread
        .messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(0);

    let mut modified = false;
    let mut called_update_plan = false;
    let mut seen: HashSet<&str> = HashSet::new();
    for message in &thread.messages[last_turn_start..] {
        for call in &message.tool_calls {
            seen.insert(call.name.as_str());
            if call.name == "update_plan" {
                called_update_plan = true;
            }
            if matches!(
                call.name.as_str(),
                "write_file" | "create_file_or_folder" | "edit" | "multiedit" | "apply_patch" | "replace_file_content" | "delete_file_or_folder"
            ) {
                modified = true;
            }
        }
    }
    let _ = seen;
    modified && !called_update_plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockProvider, ScriptedResponse};
    use crate::tools::AggregateToolSource;

    fn new_loop(provider: Arc<dyn Provider>, config: AgentLoopConfig) -> (AgentLoop, Arc<EventBus>) {
        let source = Arc::new(AggregateToolSource::new());
        let gate = Arc::new(ApprovalGate::new());
        let dir = tempfile::TempDir::new().unwrap();
        let bus = Arc::new(EventBus::new());
        let agent_loop = AgentLoop::new(provider, source, gate, Arc::new(dir.into_path()), bus.clone(), config);
        (agent_loop, bus)
    }

    #[tokio::test]
    async fn chat_mode_exits_after_first_completion_without_tools() {
        let provider = Arc::new(MockProvider::with_no_tool_calls("hello"));
        let (agent_loop, _bus) = new_loop(provider, AgentLoopConfig::default());
        let mut thread = Thread::new("t1", 0);
        thread.push(Message::user("hi"), 0);
        let ctx = ExecutionContext::new("t1", ChatMode::Chat);

        let reason = agent_loop.send(&mut thread, &ctx, "mock-model", 100_000, || 1).await.unwrap();
        assert_eq!(reason, StopReason::ChatModeNoTools);
        assert_eq!(thread.last_assistant_text(), Some("hello"));
    }

    #[tokio::test]
    async fn agent_mode_exits_cleanly_when_no_tool_calls_are_returned() {
        let provider = Arc::new(MockProvider::with_no_tool_calls("done"));
        let (agent_loop, _bus) = new_loop(provider, AgentLoopConfig::default());
        let mut thread = Thread::new("t1", 0);
        thread.push(Message::user("hi"), 0);
        let ctx = ExecutionContext::new("t1", ChatMode::Agent);

        let reason = agent_loop.send(&mut thread, &ctx, "mock-model", 100_000, || 1).await.unwrap();
        assert_eq!(reason, StopReason::Completed);
    }

    #[tokio::test]
    async fn max_tool_loops_emits_a_warning_and_stops() {
        let response = ScriptedResponse::text("go").with_tool_call("c1", "read_file", serde_json::json!({"path": "a.rs"}));
        let provider = Arc::new(MockProvider::new(vec![response]));
        let config = AgentLoopConfig {
            max_tool_loops: 1,
            ..AgentLoopConfig::default()
        };
        let (agent_loop, _bus) = new_loop(provider, config);
        let mut thread = Thread::new("t1", 0);
        thread.push(Message::user("hi"), 0);
        let ctx = ExecutionContext::new("t1", ChatMode::Agent);

        let reason = agent_loop.send(&mut thread, &ctx, "mock-model", 100_000, || 1).await.unwrap();
        assert_eq!(reason, StopReason::MaxIterations);
    }

    #[tokio::test]
    async fn xml_tool_calls_embedded_in_text_are_extracted_and_dispatched_when_structured_calls_are_absent() {
        let xml_response = ScriptedResponse::text(
            r#"Let me check that file.
<tool_call><function=read_file><parameter=path>"a.rs"</parameter></function></tool_call>"#,
        );
        let done_response = ScriptedResponse::text("done");
        let provider = Arc::new(MockProvider::new(vec![xml_response, done_response]));
        let (agent_loop, _bus) = new_loop(provider, AgentLoopConfig::default());
        let mut thread = Thread::new("t1", 0);
        thread.push(Message::user("read a.rs"), 0);
        let ctx = ExecutionContext::new("t1", ChatMode::Agent);

        let reason = agent_loop.send(&mut thread, &ctx, "mock-model", 100_000, || 1).await.unwrap();
        assert_eq!(reason, StopReason::Completed);

        let assistant_turn = thread
            .messages
            .iter()
            .find(|m| m.role == Role::Assistant && !m.tool_calls.is_empty())
            .expect("xml-extracted call should be recorded on the assistant message");
        assert_eq!(assistant_turn.tool_calls[0].name, "read_file");
        assert!(!assistant_turn.content.contains("<tool_call>"));

        let tool_message = thread.messages.iter().find(|m| m.role == Role::Tool).expect("tool result message");
        assert_eq!(tool_message.tool_name.as_deref(), Some("read_file"));
    }

    #[tokio::test]
    async fn pushing_a_user_message_opens_a_checkpoint_that_the_dispatcher_can_fill_in() {
        use crate::tools::register_builtin_tools;

        let response = ScriptedResponse::text("editing").with_tool_call(
            "call_1",
            "write_file",
            serde_json::json!({"path": "a.ts", "content": "new"}),
        );
        let done_response = ScriptedResponse::text("done");
        let provider: Arc<dyn Provider> = Arc::new(MockProvider::new(vec![response, done_response]));
        let source = Arc::new(AggregateToolSource::new());
        let dir = Arc::new(tempfile::TempDir::new().unwrap().into_path());
        register_builtin_tools(&source, dir.clone());
        let gate = Arc::new(ApprovalGate::new());
        let bus = Arc::new(EventBus::new());
        let agent_loop = AgentLoop::new(provider, source, gate, dir, bus, AgentLoopConfig::default());

        let mut thread = Thread::new("t1", 0);
        thread.push(Message::user("edit a.ts"), 0);
        assert_eq!(thread.checkpoints.len(), 1);
        let ctx = ExecutionContext::new("t1", ChatMode::Agent);

        let _ = agent_loop.send(&mut thread, &ctx, "mock-model", 100_000, || 1).await.unwrap();
        assert_eq!(thread.checkpoints.len(), 1);
        assert!(thread.checkpoints[0].snapshots.contains_key("a.ts"));
    }

    #[tokio::test]
    async fn a_second_concurrent_send_on_the_same_thread_is_rejected() {
        let provider = Arc::new(MockProvider::with_no_tool_calls("hi"));
        let (agent_loop, _bus) = new_loop(provider, AgentLoopConfig::default());
        let agent_loop = Arc::new(agent_loop);
        let mut thread_a = Thread::new("t1", 0);
        thread_a.push(Message::user("hi"), 0);

        agent_loop.running.insert("t1".to_string());
        let mut thread_b = Thread::new("t1", 0);
        let ctx = ExecutionContext::new("t1", ChatMode::Chat);
        let err = agent_loop.send(&mut thread_b, &ctx, "mock-model", 100_000, || 1).await.unwrap_err();
        assert!(matches!(err, AgentError::Compaction(_)));
    }
}

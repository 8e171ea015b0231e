//! Manual smoke-test surface for `agentcore`: run one agent turn from the
//! terminal against either a real OpenAI-compatible provider or a canned
//! `MockProvider`, streaming events to stdout as they arrive.

use std::path::PathBuf;
use std::sync::Arc;

use agentcore::{
    register_builtin_tools, AgentLoop, AgentLoopConfig, AggregateToolSource, ApprovalDecision,
    ApprovalGate, ChatMode, EventBus, ExecutionContext, LlmConfig, Message, ProviderKind,
    Thread, ToolSource,
};
use agentcore::provider::build_provider;
use agentcore::provider::mock::{MockProvider, ScriptedResponse};
use clap::{Parser, Subcommand};
use cli::host_facade::CargoCheckHostFacade;
use cli::logging;
use stream_event::{Envelope, StreamEvent};

const DEFAULT_CONTEXT_LIMIT: u32 = 128_000;

/// Thin demonstration CLI for the agentcore crate.
#[derive(Parser, Debug)]
#[command(name = "agentcore-cli", about = "Run the agentcore agent loop from the command line")]
struct Cli {
    /// Print the resolved run config (LLM provider/model, tool count) to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    /// Directory the file-editing tools are sandboxed to. Defaults to the current directory.
    #[arg(long, global = true)]
    working_folder: Option<PathBuf>,

    /// Write daily-rolling logs under this directory in addition to stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one agent turn against `prompt` and print the final assistant message.
    Chat {
        prompt: String,
        /// Use a canned MockProvider instead of a real one (no API key needed).
        #[arg(long)]
        mock: bool,
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long, default_value_t = DEFAULT_CONTEXT_LIMIT)]
        context_limit: u32,
    },
    /// Inspect the built-in tool registry.
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
}

#[derive(Subcommand, Debug)]
enum ToolAction {
    /// List every built-in tool's name and description.
    List,
    /// Show one tool's full spec as JSON.
    Show { name: String },
}

struct CliRunConfig {
    llm: agentcore::LlmConfigSummary,
    tool_count: usize,
}

impl agentcore::RunConfigSummarySource for CliRunConfig {
    fn llm_section(&self) -> agentcore::LlmConfigSummary {
        agentcore::LlmConfigSummary {
            provider: self.llm.provider.clone(),
            model: self.llm.model.clone(),
            base_url: self.llm.base_url.clone(),
            context_limit: self.llm.context_limit,
            temperature: self.llm.temperature,
        }
    }

    fn tools_section(&self) -> agentcore::ToolConfigSummary {
        agentcore::ToolConfigSummary {
            builtin_tool_count: self.tool_count,
            mcp_server_ids: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.log_dir.as_deref());
    let _ = env_config::load_and_apply("agentcore", None);

    let working_folder = cli
        .working_folder
        .clone()
        .unwrap_or_else(|| std::env::current_dir().expect("current directory must be readable"));

    let tool_source = Arc::new(AggregateToolSource::new());
    register_builtin_tools(&tool_source, Arc::new(working_folder.clone()));

    match cli.command {
        Command::Tool { action } => run_tool_command(tool_source, action).await,
        Command::Chat {
            prompt,
            mock,
            model,
            system_prompt,
            context_limit,
        } => {
            run_chat(
                tool_source,
                working_folder,
                prompt,
                mock,
                model,
                system_prompt,
                context_limit,
                cli.verbose,
            )
            .await
        }
    }
}

async fn run_tool_command(tool_source: Arc<AggregateToolSource>, action: ToolAction) -> anyhow::Result<()> {
    let specs = tool_source.list_tools().await?;
    match action {
        ToolAction::List => {
            for spec in specs {
                println!("{}\t{}", spec.name, spec.description.unwrap_or_default());
            }
        }
        ToolAction::Show { name } => {
            let spec = specs
                .into_iter()
                .find(|s| s.name == name)
                .ok_or_else(|| anyhow::anyhow!("tool not found: {name}"))?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "name": spec.name,
                "description": spec.description,
                "inputSchema": spec.input_schema,
                "approvalType": format!("{:?}", spec.approval_type),
                "category": format!("{:?}", spec.category),
                "parallelSafe": spec.parallel_safe,
            }))?);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_chat(
    tool_source: Arc<AggregateToolSource>,
    working_folder: PathBuf,
    prompt: String,
    mock: bool,
    model: String,
    system_prompt: Option<String>,
    context_limit: u32,
    verbose: bool,
) -> anyhow::Result<()> {
    let provider: Arc<dyn agentcore::Provider> = if mock {
        Arc::new(MockProvider::new(vec![ScriptedResponse::text(
            "This is a mock response; pass --mock=false with OPENAI_API_KEY set for a real one.",
        )]))
    } else {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set; pass --mock to run without a live provider"))?;
        let llm_config = LlmConfig::new(ProviderKind::Openai, &model, context_limit).with_api_key(api_key);
        build_provider(&llm_config)?
    };

    if verbose {
        let summary = agentcore::build_config_summary(&CliRunConfig {
            llm: agentcore::LlmConfigSummary {
                provider: if mock { "mock".to_string() } else { "openai".to_string() },
                model: model.clone(),
                base_url: None,
                context_limit,
                temperature: None,
            },
            tool_count: tool_source.list_tools().await?.len(),
        });
        summary.print_to_stderr();
    }

    let approval_gate = Arc::new(ApprovalGate::new());
    let event_bus = Arc::new(EventBus::new());
    let thread_id = uuid::Uuid::new_v4().to_string();

    let mut subscriber = event_bus.subscribe(&thread_id);
    let printer = tokio::spawn(async move {
        while let Ok(envelope) = subscriber.recv().await {
            print_event(&envelope);
        }
    });

    // The CLI has no interactive approval UI; auto-approve every pending request
    // as soon as it appears so a demo run never blocks forever.
    let auto_approve_gate = approval_gate.clone();
    let auto_approve_thread = thread_id.clone();
    let auto_approver = tokio::spawn(async move {
        loop {
            if auto_approve_gate.has_pending(&auto_approve_thread) {
                let _ = auto_approve_gate.resolve(&auto_approve_thread, ApprovalDecision::ApproveAndEnableAuto);
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
    });

    let mut config = AgentLoopConfig::default();
    config.system_prompt = system_prompt;

    let agent_loop = AgentLoop::new(
        provider,
        tool_source,
        approval_gate,
        Arc::new(working_folder.clone()),
        event_bus.clone(),
        config,
    )
    .with_host_facade(Arc::new(CargoCheckHostFacade::new(working_folder)));

    let mut thread = Thread::new(thread_id.clone(), now_ms());
    thread.push(Message::user(prompt), now_ms());
    let ctx = ExecutionContext::new(thread_id.clone(), ChatMode::Agent);

    let stop_reason = agent_loop.send(&mut thread, &ctx, &model, context_limit, now_ms).await?;

    auto_approver.abort();
    event_bus.close(&thread_id);
    let _ = printer.await;

    eprintln!("[stopped: {stop_reason:?}]");
    if let Some(text) = thread.last_assistant_text() {
        println!("{text}");
    }
    Ok(())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn print_event(envelope: &Envelope) {
    match &envelope.event {
        StreamEvent::Text { delta } => print!("{delta}"),
        StreamEvent::ToolPending { name, .. } => eprint!("\n[tool pending: {name}]"),
        StreamEvent::ToolCompleted { id } => eprint!("\n[tool completed: {id}]"),
        StreamEvent::ToolError { id, message } => eprint!("\n[tool error: {id}: {message}]"),
        StreamEvent::LoopWarning { reason } => eprint!("\n[loop warning: {reason}]"),
        StreamEvent::ContextHandoff => eprint!("\n[context handoff]"),
        _ => {}
    }
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

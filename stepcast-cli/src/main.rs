use std::io;
use std::process::ExitCode;

use clap::Parser;
use serde_json::{Map, Value};
use stepcast_core::{
    ReplayAgent, StepcastError, Surface, TraceRoots, TranscriptConfig, list_traces,
    render_trace_list_markdown, render_transcript, replay_request, resolve_trace,
    trace_list_to_raw_json,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stepcast",
    version,
    about = "Replay recorded agent runs as chat transcripts"
)]
struct Cli {
    /// Trace name under $STEPCAST_HOME/traces (or ~/.stepcast/traces), or a path to a .jsonl trace
    #[arg(required_unless_present = "list")]
    trace: Option<String>,

    /// Output transcript events as JSON lines instead of markdown
    #[arg(long)]
    raw: bool,

    /// List recorded traces
    #[arg(long)]
    list: bool,

    /// Task shown as the user's prompt (defaults to the task recorded in the trace)
    #[arg(long)]
    task: Option<String>,

    /// Ask the agent to forget previous runs before this one
    #[arg(long)]
    reset: bool,

    /// Tool whose arguments are rendered as python code
    #[arg(long)]
    code_tool: Option<String>,

    /// Extra argument passed to the agent run, as key=value (value may be JSON)
    #[arg(long = "arg", value_name = "KEY=VALUE")]
    args: Vec<String>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "stepcast run failed");
            let user_message = err.user_message();
            eprintln!("error: {user_message}");
            if user_message != err.to_string() {
                eprintln!("caused by: {err}");
            }
            ExitCode::from(1)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("STEPCAST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> stepcast_core::Result<()> {
    let roots = TraceRoots::from_env_or_home()?;

    if cli.list {
        if cli.trace.is_some() {
            return Err(StepcastError::InvalidArgument(
                "--list cannot be combined with a trace".to_string(),
            ));
        }

        let traces = list_traces(&roots);
        if cli.raw {
            print!("{}", trace_list_to_raw_json(&traces)?);
        } else {
            print!("{}", render_trace_list_markdown(&traces));
        }
        return Ok(());
    }

    let target = cli
        .trace
        .ok_or_else(|| StepcastError::InvalidArgument("missing trace".to_string()))?;
    let trace = resolve_trace(&target, &roots)?;

    let mut config = TranscriptConfig::from_env();
    if let Some(code_tool) = cli.code_tool {
        config.code_tool = code_tool;
    }
    let config = config.with_surface(if cli.raw {
        Surface::Json
    } else {
        Surface::Markdown
    });

    let mut agent = ReplayAgent::from_path(&trace.path)?;
    let additional_args = parse_additional_args(&cli.args)?;
    let request = replay_request(&agent, cli.task, cli.reset, additional_args);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_transcript(&mut agent, &trace.path, &request, &config, &mut out)
}

fn parse_additional_args(args: &[String]) -> stepcast_core::Result<Option<Map<String, Value>>> {
    if args.is_empty() {
        return Ok(None);
    }

    let mut map = Map::new();
    for arg in args {
        let (key, raw_value) = arg
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| {
                StepcastError::InvalidArgument(format!("expected KEY=VALUE, got `{arg}`"))
            })?;

        let value = serde_json::from_str::<Value>(raw_value)
            .unwrap_or_else(|_| Value::String(raw_value.to_string()));
        map.insert(key.trim().to_string(), value);
    }

    Ok(Some(map))
}

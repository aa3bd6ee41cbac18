use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::agent::Agent;
use crate::config::{Surface, TranscriptConfig};
use crate::error::{Result, StepcastError};
use crate::model::{Message, RunRequest, TokenTotals, TranscriptEvent};
use crate::stream::TranscriptStreamer;
use crate::trace::ResolvedTrace;
use crate::trace::replay::ReplayAgent;
use crate::transcript::Transcript;

const FALLBACK_TASK: &str = "Replay recorded trace";

/// Runs the agent and hands every event to `on_event`, starting with the
/// user's task as it would appear in a chat.
pub fn run_transcript(
    agent: &mut dyn Agent,
    request: &RunRequest,
    config: &TranscriptConfig,
    on_event: &mut dyn FnMut(TranscriptEvent) -> Result<()>,
) -> Result<TokenTotals> {
    let streamer = TranscriptStreamer::new(config.clone())?;
    on_event(Message::user(request.task.clone()).into())?;

    let mut stream = streamer.stream(agent, request)?;
    for event in stream.by_ref() {
        on_event(event?)?;
    }

    Ok(stream.totals())
}

pub fn replay_request(
    agent: &ReplayAgent,
    task: Option<String>,
    reset_memory: bool,
    additional_args: Option<Map<String, Value>>,
) -> RunRequest {
    let task = task
        .filter(|task| !task.trim().is_empty())
        .or_else(|| agent.recorded_task().map(ToString::to_string))
        .unwrap_or_else(|| FALLBACK_TASK.to_string());

    RunRequest {
        task,
        reset_memory,
        additional_args,
    }
}

pub fn render_transcript_markdown(
    agent: &mut dyn Agent,
    source_path: &Path,
    request: &RunRequest,
    config: &TranscriptConfig,
) -> Result<String> {
    let mut transcript = Transcript::new();
    let totals = run_transcript(agent, request, config, &mut |event| {
        transcript.apply(event);
        Ok(())
    })?;

    Ok(transcript.render_markdown(source_path, totals))
}

pub fn write_transcript_events(
    agent: &mut dyn Agent,
    request: &RunRequest,
    config: &TranscriptConfig,
    out: &mut dyn Write,
) -> Result<()> {
    run_transcript(agent, request, config, &mut |event| {
        let line = serde_json::to_string(&event)
            .map_err(|err| StepcastError::Serialization(err.to_string()))?;
        writeln!(out, "{line}").map_err(|source| StepcastError::Output { source })
    })?;
    Ok(())
}

pub fn render_transcript(
    agent: &mut dyn Agent,
    source_path: &Path,
    request: &RunRequest,
    config: &TranscriptConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let surface = config.validate()?;
    debug!(surface = %surface, source = %source_path.display(), "presenting transcript");

    match surface {
        Surface::Markdown => {
            let markdown = render_transcript_markdown(agent, source_path, request, config)?;
            out.write_all(markdown.as_bytes())
                .map_err(|source| StepcastError::Output { source })
        }
        Surface::Json => write_transcript_events(agent, request, config, out),
    }
}

pub fn render_trace_list_markdown(traces: &[ResolvedTrace]) -> String {
    let mut output = String::new();
    output.push_str("# Traces\n\n");

    if traces.is_empty() {
        output.push_str("_No traces found._\n");
        return output;
    }

    for trace in traces {
        output.push_str(&format!("- {} (`{}`)\n", trace.name, trace.path.display()));
    }

    output
}

pub fn trace_list_to_raw_json(traces: &[ResolvedTrace]) -> Result<String> {
    serde_json::to_string_pretty(traces)
        .map(|json| format!("{json}\n"))
        .map_err(|err| StepcastError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use crate::config::{Surface, TranscriptConfig};
    use crate::model::{RunRequest, TranscriptEvent};
    use crate::service::{
        render_trace_list_markdown, render_transcript, render_transcript_markdown,
        replay_request, trace_list_to_raw_json,
    };
    use crate::trace::ResolvedTrace;
    use crate::trace::replay::ReplayAgent;

    const RAW: &str = r#"{"type":"task","task":"what time is it"}
{"type":"action","step_number":1,"model_output":"Thought: use code","tool_calls":[{"name":"python_interpreter","arguments":{"answer":"print(now())"}}],"observations":"Execution logs:\n12:00","usage":{"input_tokens":1200,"output_tokens":5}}
{"type":"final_answer","value":{"type":"text","text":"It is noon."}}
"#;

    fn write_trace(dir: &std::path::Path) -> ResolvedTrace {
        let path = dir.join("clock.jsonl");
        fs::write(&path, RAW).expect("write");
        ResolvedTrace {
            name: "clock".to_string(),
            path,
        }
    }

    #[test]
    fn markdown_contains_whole_run() {
        let temp = tempdir().expect("tempdir");
        let trace = write_trace(temp.path());
        let mut agent = ReplayAgent::from_path(&trace.path).expect("load");
        let request = RunRequest::new("what time is it");

        let output = render_transcript_markdown(
            &mut agent,
            &trace.path,
            &request,
            &TranscriptConfig::default(),
        )
        .expect("render");

        assert!(output.contains("# Transcript"));
        assert!(output.contains("- Tokens: input=1200 output=5"));
        assert!(output.contains("## 1. User\n\nwhat time is it"));
        assert!(output.contains("Used tool python_interpreter (done)"));
        assert!(output.contains("```python\nprint(now())\n```"));
        assert!(output.contains("Execution Logs (done)\n\n12:00"));
        assert!(output.contains("Input-tokens:1,200 | Output-tokens:5"));
        assert!(output.contains("**Final answer:**\nIt is noon."));
    }

    #[test]
    fn json_surface_streams_update_events() {
        let temp = tempdir().expect("tempdir");
        let trace = write_trace(temp.path());
        let mut agent = ReplayAgent::from_path(&trace.path).expect("load");
        let config = TranscriptConfig::default().with_surface(Surface::Json);

        let mut out = Vec::new();
        render_transcript(
            &mut agent,
            &trace.path,
            &RunRequest::new("t"),
            &config,
            &mut out,
        )
        .expect("render");

        let events: Vec<TranscriptEvent> = String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("event json"))
            .collect();
        assert!(events.iter().any(|event| matches!(
            event,
            TranscriptEvent::StatusUpdate { id, .. } if id == "call_1"
        )));
        assert_eq!(
            events
                .last()
                .and_then(TranscriptEvent::as_message)
                .and_then(|message| message.text()),
            Some("**Final answer:**\nIt is noon.\n")
        );
    }

    #[test]
    fn replay_request_prefers_explicit_task() {
        let temp = tempdir().expect("tempdir");
        let trace = write_trace(temp.path());
        let agent = ReplayAgent::from_path(&trace.path).expect("load");

        let explicit = replay_request(&agent, Some("custom".to_string()), false, None);
        assert_eq!(explicit.task, "custom");

        let recorded = replay_request(&agent, None, true, None);
        assert_eq!(recorded.task, "what time is it");
        assert!(recorded.reset_memory);

        let fallback = replay_request(&ReplayAgent::default(), Some("  ".to_string()), false, None);
        assert_eq!(fallback.task, "Replay recorded trace");
    }

    #[test]
    fn trace_list_renders_both_forms() {
        let traces = vec![ResolvedTrace {
            name: "clock".to_string(),
            path: PathBuf::from("/tmp/traces/clock.jsonl"),
        }];

        let markdown = render_trace_list_markdown(&traces);
        assert!(markdown.contains("- clock (`/tmp/traces/clock.jsonl`)"));

        let raw = trace_list_to_raw_json(&traces).expect("json");
        assert!(raw.contains("\"name\": \"clock\""));

        assert!(render_trace_list_markdown(&[]).contains("_No traces found._"));
    }
}

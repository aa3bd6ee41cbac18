use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::model::{
    ActionStep, Message, MessageMetadata, MessageStatus, Step, ToolArguments, ToolCall,
    TranscriptEvent,
};

pub const DEFAULT_CODE_TOOL: &str = "python_interpreter";
pub const STEP_SEPARATOR: &str = "-----";

const TOOL_TITLE_PREFIX: &str = "🛠️ Used tool";
const LOGS_TITLE: &str = "📝 Execution Logs";
const ERROR_TITLE: &str = "💥 Error";
const FOOTNOTE_OPEN: &str = r#"<span style="color: #bbbbc2; font-size: 12px;">"#;
const FOOTNOTE_CLOSE: &str = "</span> ";
const PYTHON_FENCE: &str = "```python";

// ```<end_code>
static FENCE_THEN_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*<end_code>").expect("valid regex"));
// <end_code>```
static END_THEN_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<end_code>\s*```").expect("valid regex"));
// ```\n<end_code>
static FENCE_LINE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*\n\s*<end_code>").expect("valid regex"));
static CODE_FENCE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```.*?\n").expect("valid regex"));
static END_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*<end_code>\s*").expect("valid regex"));
static LOGS_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Execution logs:\s*").expect("valid regex"));

pub fn extract_step_events(step: &Step, code_tool: &str) -> Vec<TranscriptEvent> {
    match step {
        Step::Action(action) => extract_action_events(action, code_tool),
        Step::Task(_) | Step::Planning(_) | Step::FinalAnswer(_) => Vec::new(),
    }
}

fn extract_action_events(step: &ActionStep, code_tool: &str) -> Vec<TranscriptEvent> {
    let mut events = Vec::new();

    let label = step_label(step);
    let header = if label.is_empty() {
        String::new()
    } else {
        format!("**{label}**")
    };
    events.push(Message::assistant(header).into());

    if let Some(model_output) = &step.model_output {
        events.push(Message::assistant(normalize_model_output(model_output)).into());
    }

    match step.tool_calls.as_deref() {
        Some(calls @ [first, ..]) => {
            let parent_id = format!("call_{}", calls.len());
            push_tool_call_events(&mut events, step, first, &parent_id, code_tool);
        }
        Some([]) | None => {
            if let Some(error) = &step.error {
                events.push(
                    Message::assistant(error.clone())
                        .with_metadata(MessageMetadata {
                            title: Some(ERROR_TITLE.to_string()),
                            ..MessageMetadata::default()
                        })
                        .into(),
                );
            }
        }
    }

    events.push(Message::assistant(step_footnote(step, &label)).into());
    events.push(Message::assistant(STEP_SEPARATOR).into());

    events
}

fn push_tool_call_events(
    events: &mut Vec<TranscriptEvent>,
    step: &ActionStep,
    call: &ToolCall,
    parent_id: &str,
    code_tool: &str,
) {
    let used_code = call.name == code_tool;
    let mut content = tool_call_content(&call.arguments);
    if used_code {
        content = wrap_python_code(&content);
    }

    events.push(
        Message::assistant(content)
            .with_metadata(MessageMetadata {
                title: Some(format!("{TOOL_TITLE_PREFIX} {}", call.name)),
                id: Some(parent_id.to_string()),
                parent_id: None,
                status: Some(MessageStatus::Pending),
            })
            .into(),
    );

    if let Some(logs) = step.observations.as_deref().and_then(execution_logs) {
        events.push(child_message(logs, LOGS_TITLE, parent_id).into());
    }

    if let Some(error) = &step.error {
        events.push(child_message(error.clone(), ERROR_TITLE, parent_id).into());
    }

    events.push(TranscriptEvent::StatusUpdate {
        id: parent_id.to_string(),
        status: MessageStatus::Done,
    });
}

fn child_message(content: String, title: &str, parent_id: &str) -> Message {
    Message::assistant(content).with_metadata(MessageMetadata {
        title: Some(title.to_string()),
        id: None,
        parent_id: Some(parent_id.to_string()),
        status: Some(MessageStatus::Done),
    })
}

fn step_label(step: &ActionStep) -> String {
    step.step_number
        .map(|number| format!("Step {number}"))
        .unwrap_or_default()
}

/// Cleans the raw model output, folding the `<end_code>` marker variants
/// around a closing fence into a bare fence.
pub fn normalize_model_output(raw: &str) -> String {
    let output = raw.trim();
    let output = FENCE_THEN_END_RE.replace_all(output, "```");
    let output = END_THEN_FENCE_RE.replace_all(&output, "```");
    let output = FENCE_LINE_END_RE.replace_all(&output, "```");
    output.trim().to_string()
}

fn tool_call_content(arguments: &ToolArguments) -> String {
    match arguments {
        ToolArguments::Mapping(map) => match map.get("answer") {
            Some(Value::String(answer)) => answer.clone(),
            Some(answer) => answer.to_string(),
            None => Value::Object(map.clone()).to_string(),
        },
        ToolArguments::Scalar(Value::String(text)) => text.trim().to_string(),
        ToolArguments::Scalar(value) => value.to_string().trim().to_string(),
    }
}

fn wrap_python_code(content: &str) -> String {
    let content = CODE_FENCE_LINE_RE.replace_all(content, "");
    let content = END_CODE_RE.replace_all(&content, "");
    let content = content.trim();

    if content.starts_with(PYTHON_FENCE) {
        content.to_string()
    } else {
        format!("{PYTHON_FENCE}\n{content}\n```")
    }
}

fn execution_logs(observations: &str) -> Option<String> {
    let trimmed = observations.trim();
    if trimmed.is_empty() {
        return None;
    }

    let logs = LOGS_PREFIX_RE.replace(trimmed, "");
    if logs.is_empty() {
        return None;
    }

    Some(logs.into_owned())
}

fn step_footnote(step: &ActionStep, label: &str) -> String {
    let mut footnote = label.to_string();

    if let (Some(input), Some(output)) = (step.input_token_count, step.output_token_count) {
        footnote.push_str(&format!(
            " | Input-tokens:{} | Output-tokens:{}",
            group_thousands(input),
            group_thousands(output)
        ));
    }

    if let Some(duration) = step.duration.filter(|duration| *duration != 0.0) {
        footnote.push_str(&format!(" | Duration: {}", format_duration(duration)));
    }

    format!("{FOOTNOTE_OPEN}{footnote}{FOOTNOTE_CLOSE}")
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

// Two decimals, but whole numbers keep one trailing zero (`2.0`).
fn format_duration(seconds: f64) -> String {
    if seconds.is_nan() {
        return "nan".to_string();
    }
    if seconds.is_infinite() {
        return if seconds > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    // Magnitudes this large switch to exponent notation with a signed exponent.
    if seconds.abs() >= 1e16 {
        let exponent = format!("{seconds:e}");
        return match exponent.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => exponent,
        };
    }

    let rounded = (seconds * 100.0).round() / 100.0;
    if rounded.is_finite() && rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}

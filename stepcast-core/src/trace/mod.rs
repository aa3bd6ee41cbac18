use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::TraceRoots;
use crate::error::{Result, StepcastError};
use crate::model::{Step, TokenUsage};

pub mod replay;

const TRACE_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTrace {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub step: Step,
    pub usage: Option<TokenUsage>,
}

pub fn resolve_trace(target: &str, roots: &TraceRoots) -> Result<ResolvedTrace> {
    let direct = Path::new(target);
    if direct.is_file() {
        return Ok(ResolvedTrace {
            name: trace_name(direct),
            path: direct.to_path_buf(),
        });
    }

    let file_name = if target.ends_with(&format!(".{TRACE_EXTENSION}")) {
        target.to_string()
    } else {
        format!("{target}.{TRACE_EXTENSION}")
    };
    let path = roots.traces_root.join(file_name);

    if !path.is_file() {
        return Err(StepcastError::TraceNotFound {
            name: target.to_string(),
            searched_roots: vec![roots.traces_root.clone()],
        });
    }

    Ok(ResolvedTrace {
        name: trace_name(&path),
        path,
    })
}

pub fn list_traces(roots: &TraceRoots) -> Vec<ResolvedTrace> {
    let root = &roots.traces_root;
    if !root.exists() {
        return Vec::new();
    }

    let mut traces = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == TRACE_EXTENSION)
        })
        .map(|path| {
            let name = path
                .strip_prefix(root)
                .map(|relative| relative.with_extension(""))
                .map(|relative| relative.display().to_string())
                .unwrap_or_else(|_| trace_name(&path));
            ResolvedTrace { name, path }
        })
        .collect::<Vec<_>>();

    traces.sort_by(|a, b| a.name.cmp(&b.name));
    traces
}

fn trace_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}

pub fn read_trace_raw(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| StepcastError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(StepcastError::EmptyTraceFile {
            path: path.to_path_buf(),
        });
    }

    String::from_utf8(bytes).map_err(|_| StepcastError::NonUtf8TraceFile {
        path: path.to_path_buf(),
    })
}

pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>> {
    let raw = read_trace_raw(path)?;
    let records = parse_trace(path, &raw)?;
    debug!(path = %path.display(), steps = records.len(), "loaded trace");
    Ok(records)
}

pub fn parse_trace(path: &Path, raw_jsonl: &str) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();

    for (line_idx, line) in raw_jsonl.lines().enumerate() {
        let line_no = line_idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let invalid_line = |source| StepcastError::InvalidJsonLine {
            path: path.to_path_buf(),
            line: line_no,
            source,
        };

        let mut value = serde_json::from_str::<Value>(trimmed).map_err(invalid_line)?;
        let usage = value
            .as_object_mut()
            .and_then(|object| object.remove("usage"))
            .filter(|usage| !usage.is_null())
            .map(serde_json::from_value::<TokenUsage>)
            .transpose()
            .map_err(invalid_line)?;
        let step = serde_json::from_value::<Step>(value).map_err(invalid_line)?;

        records.push(TraceRecord { step, usage });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use crate::config::TraceRoots;
    use crate::model::{Step, TokenUsage, ToolArguments};
    use crate::trace::{list_traces, load_trace, parse_trace, resolve_trace};

    const RAW: &str = r#"{"type":"task","task":"what time is it"}
{"type":"action","step_number":1,"model_output":"Thought: ask","tool_calls":[{"name":"python_interpreter","arguments":{"answer":"print(1)"}}],"observations":"Execution logs:\n1","duration":0.5,"usage":{"input_tokens":120,"output_tokens":8}}

{"type":"final_answer","value":"noon"}"#;

    #[test]
    fn parses_steps_and_usage() {
        let records = parse_trace(Path::new("/tmp/mock.jsonl"), RAW).expect("parse");
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0].step, Step::Task(_)));
        assert_eq!(records[0].usage, None);
        assert_eq!(
            records[1].usage,
            Some(TokenUsage {
                input_tokens: 120,
                output_tokens: 8,
            })
        );

        let Step::Action(action) = &records[1].step else {
            panic!("expected action step");
        };
        assert_eq!(action.step_number, Some(1));
        assert_eq!(action.duration, Some(0.5));
        assert_eq!(action.error, None);
        let calls = action.tool_calls.as_ref().expect("tool calls");
        assert!(matches!(calls[0].arguments, ToolArguments::Mapping(_)));
    }

    #[test]
    fn scalar_arguments_parse_as_scalar() {
        let raw = r#"{"type":"action","tool_calls":[{"name":"final_answer","arguments":"42"}]}"#;
        let records = parse_trace(Path::new("/tmp/mock.jsonl"), raw).expect("parse");
        let Step::Action(action) = &records[0].step else {
            panic!("expected action step");
        };
        let calls = action.tool_calls.as_ref().expect("tool calls");
        assert_eq!(
            calls[0].arguments,
            ToolArguments::Scalar(serde_json::json!("42"))
        );
    }

    #[test]
    fn invalid_line_reports_line_number() {
        let raw = "{\"type\":\"task\",\"task\":\"x\"}\n{not json}\n";
        let err = parse_trace(Path::new("/tmp/mock.jsonl"), raw).expect_err("must fail");
        assert!(format!("{err}").contains("at line 2"));
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let raw = r#"{"type":"telemetry"}"#;
        assert!(parse_trace(Path::new("/tmp/mock.jsonl"), raw).is_err());
    }

    #[test]
    fn empty_file_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("empty.jsonl");
        fs::write(&path, "").expect("write");
        let err = load_trace(&path).expect_err("must fail");
        assert!(format!("{err}").contains("trace file is empty"));
    }

    #[test]
    fn resolves_by_name_and_by_path() {
        let temp = tempdir().expect("tempdir");
        let roots = TraceRoots::new(temp.path().join("traces"));
        fs::create_dir_all(&roots.traces_root).expect("mkdir");
        let path = roots.traces_root.join("clock.jsonl");
        fs::write(&path, RAW).expect("write");

        let by_name = resolve_trace("clock", &roots).expect("resolve by name");
        assert_eq!(by_name.path, path);
        assert_eq!(by_name.name, "clock");

        let by_path = resolve_trace(path.to_str().expect("utf8 path"), &roots)
            .expect("resolve by path");
        assert_eq!(by_path.path, path);
    }

    #[test]
    fn missing_trace_returns_not_found() {
        let temp = tempdir().expect("tempdir");
        let roots = TraceRoots::new(temp.path());
        let err = resolve_trace("nowhere", &roots).expect_err("must fail");
        assert!(format!("{err}").contains("trace not found"));
    }

    #[test]
    fn lists_nested_traces_sorted() {
        let temp = tempdir().expect("tempdir");
        let roots = TraceRoots::new(temp.path());
        fs::create_dir_all(temp.path().join("team")).expect("mkdir");
        fs::write(temp.path().join("zeta.jsonl"), RAW).expect("write");
        fs::write(temp.path().join("team/alpha.jsonl"), RAW).expect("write");
        fs::write(temp.path().join("notes.txt"), "ignored").expect("write");

        let names: Vec<_> = list_traces(&roots)
            .into_iter()
            .map(|trace| trace.name)
            .collect();
        assert_eq!(names, vec!["team/alpha".to_string(), "zeta".to_string()]);
    }
}

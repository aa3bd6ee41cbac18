use std::path::PathBuf;

use thiserror::Error;

const AGENT_UNAVAILABLE: &str = "The agent is unavailable right now. Please try again later.";

#[derive(Debug, Error)]
pub enum StepcastError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("agent failure: {0}")]
    Agent(String),

    #[error("normalization failure: {0}")]
    Normalization(String),

    #[error("agent run produced no steps")]
    EmptyRun,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cannot determine home directory")]
    HomeDirectoryNotFound,

    #[error("trace not found: {name}")]
    TraceNotFound {
        name: String,
        searched_roots: Vec<PathBuf>,
    },

    #[error("trace file is empty: {path}")]
    EmptyTraceFile { path: PathBuf },

    #[error("trace file is not valid UTF-8: {path}")]
    NonUtf8TraceFile { path: PathBuf },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write transcript output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json line in {path} at line {line}: {source}")]
    InvalidJsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl StepcastError {
    /// Text shown to an end user. Failures inside the agent collapse into a
    /// generic notice; everything else is already actionable as-is.
    pub fn user_message(&self) -> String {
        match self {
            Self::Agent(_) | Self::Normalization(_) | Self::EmptyRun => {
                AGENT_UNAVAILABLE.to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StepcastError>;

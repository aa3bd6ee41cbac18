use std::env;
use std::fmt;
use std::path::PathBuf;

use dirs::home_dir;

use crate::error::{Result, StepcastError};
use crate::render::DEFAULT_CODE_TOOL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Markdown,
    Json,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptConfig {
    /// Tool name whose arguments are shown as a python code block.
    pub code_tool: String,
    pub surface: Option<Surface>,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            code_tool: DEFAULT_CODE_TOOL.to_string(),
            surface: Some(Surface::Markdown),
        }
    }
}

impl TranscriptConfig {
    pub fn from_env() -> Self {
        // Precedence:
        // 1) STEPCAST_CODE_TOOL
        // 2) python_interpreter
        let code_tool = env::var("STEPCAST_CODE_TOOL")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CODE_TOOL.to_string());

        Self {
            code_tool,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn validate(&self) -> Result<Surface> {
        let surface = self.surface.ok_or_else(|| {
            StepcastError::Configuration("no presentation surface configured".to_string())
        })?;

        if self.code_tool.trim().is_empty() {
            return Err(StepcastError::Configuration(
                "code tool name must not be empty".to_string(),
            ));
        }

        Ok(surface)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRoots {
    pub traces_root: PathBuf,
}

impl TraceRoots {
    pub fn new(traces_root: impl Into<PathBuf>) -> Self {
        Self {
            traces_root: traces_root.into(),
        }
    }

    pub fn from_env_or_home() -> Result<Self> {
        // Precedence:
        // 1) STEPCAST_HOME/traces
        // 2) ~/.stepcast/traces
        let traces_root = match env::var_os("STEPCAST_HOME").filter(|path| !path.is_empty()) {
            Some(path) => PathBuf::from(path).join("traces"),
            None => home_dir()
                .ok_or(StepcastError::HomeDirectoryNotFound)?
                .join(".stepcast/traces"),
        };

        Ok(Self { traces_root })
    }
}

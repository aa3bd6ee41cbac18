use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Task(TaskStep),
    Planning(PlanningStep),
    Action(ActionStep),
    FinalAnswer(FinalAnswerStep),
}

impl Step {
    pub fn as_action_mut(&mut self) -> Option<&mut ActionStep> {
        match self {
            Self::Action(step) => Some(step),
            Self::Task(_) | Self::Planning(_) | Self::FinalAnswer(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    #[serde(default)]
    pub task: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningStep {
    #[serde(default)]
    pub plan: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswerStep {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: ToolArguments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Mapping(Map<String, Value>),
    Scalar(Value),
}

impl Default for ToolArguments {
    fn default() -> Self {
        Self::Scalar(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenTotals {
    pub fn add(&mut self, usage: TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub task: String,
    pub reset_memory: bool,
    pub additional_args: Option<Map<String, Value>>,
}

impl RunRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Done,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Media { path: PathBuf, mime_type: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(text.into()),
            metadata: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
            metadata: None,
        }
    }

    pub fn media(path: impl Into<PathBuf>, mime_type: &str) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Media {
                path: path.into(),
                mime_type: mime_type.to_string(),
            },
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Media { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|meta| meta.id.as_deref())
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.parent_id.as_deref())
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|meta| meta.title.as_deref())
    }

    pub fn status(&self) -> Option<MessageStatus> {
        self.metadata.as_ref().and_then(|meta| meta.status)
    }
}

/// What a presentation surface receives, in order.
///
/// A `StatusUpdate` refers to a message emitted earlier with the same id and
/// changes how that message is shown; it never adds a new transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TranscriptEvent {
    Message(Message),
    StatusUpdate { id: String, status: MessageStatus },
}

impl TranscriptEvent {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(message) => Some(message),
            Self::StatusUpdate { .. } => None,
        }
    }
}

impl From<Message> for TranscriptEvent {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalAnswer {
    Text(String),
    Image(PathBuf),
    Audio(PathBuf),
    Other(String),
}

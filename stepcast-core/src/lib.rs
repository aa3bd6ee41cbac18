pub mod agent;
pub mod config;
pub mod error;
pub mod final_answer;
pub mod model;
pub mod render;
pub mod service;
pub mod stream;
pub mod trace;
pub mod transcript;

pub use agent::{Agent, StepStream};
pub use config::{Surface, TraceRoots, TranscriptConfig};
pub use error::{Result, StepcastError};
pub use final_answer::{DefaultClassifier, OutputClassifier, render_final_answer};
pub use model::{
    ActionStep, FinalAnswer, Message, MessageContent, MessageMetadata, MessageRole,
    MessageStatus, RunRequest, Step, TokenTotals, TokenUsage, ToolArguments, ToolCall,
    TranscriptEvent,
};
pub use render::extract_step_events;
pub use service::{
    render_trace_list_markdown, render_transcript, render_transcript_markdown, replay_request,
    run_transcript, trace_list_to_raw_json, write_transcript_events,
};
pub use stream::{TranscriptStream, TranscriptStreamer};
pub use trace::replay::ReplayAgent;
pub use trace::{ResolvedTrace, list_traces, resolve_trace};
pub use transcript::Transcript;

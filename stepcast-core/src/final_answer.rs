use std::path::PathBuf;

use serde_json::Value;

use crate::error::{Result, StepcastError};
use crate::model::{FinalAnswer, Message, Step};

const IMAGE_MIME: &str = "image/png";
const AUDIO_MIME: &str = "audio/wav";

pub trait OutputClassifier {
    fn classify(&self, last_step: &Step) -> Result<FinalAnswer>;
}

/// Recognizes `{"type": "text" | "image" | "audio", ...}` final values and
/// falls back to `Other` for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl OutputClassifier for DefaultClassifier {
    fn classify(&self, last_step: &Step) -> Result<FinalAnswer> {
        match last_step {
            Step::FinalAnswer(final_step) => Ok(classify_value(&final_step.value)),
            Step::Task(_) | Step::Planning(_) | Step::Action(_) => {
                let raw = serde_json::to_string(last_step)
                    .map_err(|err| StepcastError::Normalization(err.to_string()))?;
                Ok(FinalAnswer::Other(raw))
            }
        }
    }
}

fn classify_value(value: &Value) -> FinalAnswer {
    if let Some(text) = value.as_str() {
        return FinalAnswer::Other(text.to_string());
    }

    let kind = value.get("type").and_then(Value::as_str);
    match kind {
        Some("text") => {
            if let Some(text) = value.get("text").and_then(Value::as_str) {
                return FinalAnswer::Text(text.to_string());
            }
        }
        Some("image") => {
            if let Some(path) = value.get("path").and_then(Value::as_str) {
                return FinalAnswer::Image(PathBuf::from(path));
            }
        }
        Some("audio") => {
            if let Some(path) = value.get("path").and_then(Value::as_str) {
                return FinalAnswer::Audio(PathBuf::from(path));
            }
        }
        _ => {}
    }

    FinalAnswer::Other(value.to_string())
}

pub fn render_final_answer(answer: &FinalAnswer) -> Message {
    match answer {
        FinalAnswer::Text(text) => Message::assistant(format!("**Final answer:**\n{text}\n")),
        FinalAnswer::Image(path) => Message::media(path.clone(), IMAGE_MIME),
        FinalAnswer::Audio(path) => Message::media(path.clone(), AUDIO_MIME),
        FinalAnswer::Other(value) => Message::assistant(format!("**Final answer:** {value}")),
    }
}

use std::path::Path;

use tracing::warn;

use crate::model::{Message, MessageContent, MessageRole, TokenTotals, TranscriptEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns `false` when a status update names an id no message carries.
    pub fn apply(&mut self, event: TranscriptEvent) -> bool {
        match event {
            TranscriptEvent::Message(message) => {
                self.messages.push(message);
                true
            }
            TranscriptEvent::StatusUpdate { id, status } => {
                let target = self
                    .messages
                    .iter_mut()
                    .rev()
                    .find(|message| message.id() == Some(id.as_str()))
                    .and_then(|message| message.metadata.as_mut());

                match target {
                    Some(metadata) => {
                        metadata.status = Some(status);
                        true
                    }
                    None => {
                        warn!(id = %id, "status update for unknown message");
                        false
                    }
                }
            }
        }
    }

    pub fn render_markdown(&self, source_path: &Path, totals: TokenTotals) -> String {
        let mut output = String::new();
        output.push_str("# Transcript\n\n");
        output.push_str(&format!("- Source: `{}`\n", source_path.display()));
        output.push_str(&format!(
            "- Tokens: input={} output={}\n\n",
            totals.input_tokens, totals.output_tokens
        ));

        let visible: Vec<&Message> = self
            .messages
            .iter()
            .filter(|message| message.text().is_none_or(|text| !text.trim().is_empty()))
            .collect();

        if visible.is_empty() {
            output.push_str("_No messages._\n");
            return output;
        }

        for (idx, message) in visible.iter().enumerate() {
            let level = if message.parent_id().is_some() {
                "###"
            } else {
                "##"
            };
            output.push_str(&format!("{level} {}. {}\n\n", idx + 1, heading(message)));
            output.push_str(&render_content(&message.content));
            output.push_str("\n\n");
        }

        output
    }
}

fn heading(message: &Message) -> String {
    let role = match message.role {
        MessageRole::User => "User",
        MessageRole::Assistant => "Assistant",
    };

    let mut heading = role.to_string();
    if let Some(title) = message.title() {
        heading.push_str(&format!(": {title}"));
    }
    if let Some(status) = message.status() {
        heading.push_str(&format!(" ({status})"));
    }
    heading
}

fn render_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.trim().to_string(),
        MessageContent::Media { path, mime_type } => {
            let marker = if mime_type.starts_with("image/") {
                "!"
            } else {
                ""
            };
            format!("{marker}[{mime_type}]({})", path.display())
        }
    }
}

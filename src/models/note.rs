use serde::{Deserialize, Serialize};

const GENERATED_PREFIX: &str = "Coach (LLM): ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoteSource {
    /// Sent by the backend as a `text` frame.
    Stream,
    /// Produced by the note-generation service.
    Generated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub text: String,
    pub source: NoteSource,
}

impl NoteEntry {
    pub fn stream(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: NoteSource::Stream,
        }
    }

    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: NoteSource::Generated,
        }
    }

    /// Text as shown in the notes panel.
    pub fn display_text(&self) -> String {
        match self.source {
            NoteSource::Stream => self.text.clone(),
            NoteSource::Generated => format!("{GENERATED_PREFIX}{}", self.text),
        }
    }
}

//! One message of a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Persona,
}

/// A single message; ordering is by `created_at`, then insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    pub fn persona(text: impl Into<String>) -> Self {
        Self::new(Speaker::Persona, text)
    }

    pub fn is_persona(&self) -> bool {
        self.speaker == Speaker::Persona
    }
}

/// The most recent persona turn in `history`.
pub fn last_persona_turn(history: &[Turn]) -> Option<&Turn> {
    history.iter().rev().find(|t| t.is_persona())
}

/// Render turns as `Speaker: text` lines, naming the persona `persona_name`.
pub fn render_transcript(turns: &[Turn], persona_name: &str) -> String {
    turns
        .iter()
        .map(|t| match t.speaker {
            Speaker::User => format!("User: {}", t.text),
            Speaker::Persona => format!("{}: {}", persona_name, t.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

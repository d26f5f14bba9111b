//! Conversation summarization for long histories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::ChatCompletion;
use crate::memory::{render_transcript, Turn};
use crate::utilities::errors::SummarizeError;
use crate::utilities::i18n::get_i18n;
use crate::utilities::string_utils::{interpolate, preview};

/// Condenses a transcript into a dense summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `turns`; the persona is named `persona_name` in the transcript.
    async fn summarize(&self, turns: &[Turn], persona_name: &str) -> Result<String, SummarizeError>;
}

/// Summarizer backed by a chat-completion model.
pub struct LlmSummarizer {
    llm: Arc<dyn ChatCompletion>,
    model: Option<String>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The summarization request for `turns`.
    pub fn build_prompt(turns: &[Turn], persona_name: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("conversation", render_transcript(turns, persona_name));
        let template = get_i18n().slice("summarize");
        interpolate(template, &vars).unwrap_or_else(|_| template.to_string())
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, turns: &[Turn], persona_name: &str) -> Result<String, SummarizeError> {
        if turns.is_empty() {
            return Err(SummarizeError::Empty);
        }
        log::info!(
            "Generating summary for conversation with {} messages.",
            turns.len()
        );
        let prompt = Self::build_prompt(turns, persona_name);
        let summary = self
            .llm
            .complete(&prompt, "", self.model.as_deref(), &[])
            .await?;
        log::debug!("Generated summary: {}", preview(&summary, 200));
        Ok(summary)
    }
}

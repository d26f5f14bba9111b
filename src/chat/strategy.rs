//! Strategy Advisor: the planning pre-pass before the main completion.
//!
//! A cheap call over the recent transcript that returns a few imperative
//! bullets (avoid greeting X, stop retelling story Y, change topic). The
//! bullets are spliced into the system prompt of the writing call. Any
//! failure yields `None` and the reply is written without a strategy.

use std::sync::Arc;
use std::time::Duration;

use crate::llm::ChatCompletion;
use crate::memory::{Speaker, Turn};
use crate::persona::PersonaConfig;
use crate::utilities::config::SynthesisConfig;
use crate::utilities::errors::LlmError;
use crate::utilities::i18n::get_i18n;

use super::prompt::fill;

/// Bullets kept from an advisor reply.
pub const MAX_DIRECTIVES: usize = 4;

pub struct StrategyAdvisor {
    llm: Arc<dyn ChatCompletion>,
    model: Option<String>,
    pet_names: Vec<String>,
    turn_window: usize,
    timeout: Duration,
}

impl StrategyAdvisor {
    pub fn new(llm: Arc<dyn ChatCompletion>, pet_names: Vec<String>, config: &SynthesisConfig) -> Self {
        Self {
            llm,
            model: None,
            pet_names,
            turn_window: config.strategy_turn_window,
            timeout: config.auxiliary_timeout,
        }
    }

    /// Use a dedicated (usually cheaper) model for the pre-pass.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The analysis request for the last `turn_window` turns of `history`.
    pub fn build_prompt(&self, persona: &PersonaConfig, history: &[Turn]) -> String {
        let start = history.len().saturating_sub(self.turn_window);
        let recent = history[start..]
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let speaker = match t.speaker {
                    Speaker::User => "User",
                    Speaker::Persona => persona.name.as_str(),
                };
                format!("{}. {}: {}", i + 1, speaker, t.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let or_none = |items: &[String]| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(", ")
            }
        };

        fill(
            get_i18n().slice("strategy_analysis"),
            &[
                ("persona_name", persona.name.clone()),
                (
                    "backstory",
                    persona.backstory.clone().unwrap_or_else(|| persona.description.clone()),
                ),
                ("recent", recent),
                ("pet_names", or_none(&self.pet_names)),
                ("story_markers", or_none(&persona.strategy.story_markers)),
                ("alternate_topics", or_none(&persona.strategy.alternate_topics)),
            ],
        )
    }

    /// Ask the model for a directive. `None` on timeout, error or an empty answer.
    pub async fn generate(&self, persona: &PersonaConfig, history: &[Turn]) -> Option<String> {
        let prompt = self.build_prompt(persona, history);
        let call = self.llm.complete(&prompt, "", self.model.as_deref(), &[]);

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        };

        match result {
            Ok(text) => {
                let strategy = parse_strategy(&text);
                if let Some(s) = &strategy {
                    log::debug!("Strategy for {}: {}", persona.id, s.replace('\n', " | "));
                }
                strategy
            }
            Err(e) => {
                log::error!("Strategy generation failed for {}: {}", persona.id, e);
                None
            }
        }
    }
}

/// Keep at most [`MAX_DIRECTIVES`] bullets; prose is kept whole.
pub fn parse_strategy(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let bullets: Vec<&str> = lines.iter().copied().filter(|l| is_bullet(l)).collect();
    if bullets.is_empty() {
        return Some(lines.join("\n"));
    }
    Some(
        bullets
            .into_iter()
            .take(MAX_DIRECTIVES)
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn is_bullet(line: &str) -> bool {
    if line.starts_with(['-', '*', '•']) {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with(['.', ')'])
}

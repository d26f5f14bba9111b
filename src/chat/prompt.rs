//! Enriched system prompt assembly.
//!
//! Sections are emitted in a fixed order and joined by blank lines:
//! persona prompt, style, examples, context, behavior, persona flourishes,
//! strategy, recent transcript, repetition constraints. Optional sections
//! with nothing to say are left out entirely.

use std::collections::HashMap;

use serde_json::Value;

use super::features::Vocabulary;
use super::repetition::RepetitionState;
use crate::memory::{render_transcript, Turn};
use crate::persona::PersonaConfig;
use crate::training::ScoredExample;
use crate::utilities::config::SynthesisConfig;
use crate::utilities::i18n::get_i18n;
use crate::utilities::string_utils::interpolate;

/// Everything one prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub persona: &'a PersonaConfig,
    /// Scored examples, highest score first.
    pub examples: &'a [ScoredExample],
    pub summary: Option<&'a str>,
    pub current_context: Option<&'a Value>,
    pub user_id: Option<&'a str>,
    pub strategy: Option<&'a str>,
    /// Stored history, oldest first.
    pub recent_turns: &'a [Turn],
    /// Greeting and pet name of the persona's most recent reply.
    pub last_reply: &'a RepetitionState,
}

/// Builds the per-request system prompt.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    vocabulary: Vocabulary,
    example_limit: usize,
    recent_turn_window: usize,
    no_pet_name_share: f64,
}

impl PromptComposer {
    pub fn new(vocabulary: Vocabulary, config: &SynthesisConfig) -> Self {
        Self {
            vocabulary,
            example_limit: config.example_limit,
            recent_turn_window: config.recent_turn_window,
            no_pet_name_share: config.no_pet_name_share.clamp(0.0, 1.0),
        }
    }

    pub fn compose(&self, inputs: &PromptInputs<'_>) -> String {
        let persona = inputs.persona;
        let i18n = get_i18n();
        let mut sections: Vec<String> = Vec::with_capacity(9);

        sections.push(persona.system_prompt.trim().to_string());
        sections.push(self.style_section(persona));

        if let Some(examples) = self.examples_section(persona, inputs.examples) {
            sections.push(examples);
        }
        if let Some(context) = context_section(inputs) {
            sections.push(context);
        }

        sections.push(i18n.slice("behavior").to_string());

        if persona.capabilities.hinglish_style {
            sections.push(i18n.slice("hinglish").to_string());
        }
        if persona.capabilities.pet_names {
            let percent = (self.no_pet_name_share * 100.0).round() as u32;
            sections.push(fill(
                i18n.slice("pet_names"),
                &[
                    ("no_pet_name_percent", percent.to_string()),
                    ("pet_names", quoted_list(self.vocabulary.pet_names.iter())),
                ],
            ));
            sections.push(i18n.slice("terse_input").to_string());
        }

        if persona.capabilities.strategy_advisor {
            if let Some(strategy) = inputs.strategy.map(str::trim).filter(|s| !s.is_empty()) {
                sections.push(format!("{}\n{}", i18n.slice("strategy_header"), strategy));
            }
        }

        if let Some(recent) = self.recent_section(persona, inputs.recent_turns) {
            sections.push(recent);
        }

        sections.push(self.repetition_section(inputs.last_reply));

        sections.join("\n\n")
    }

    fn style_section(&self, persona: &PersonaConfig) -> String {
        let style = &persona.style;
        let mut lines = vec![
            get_i18n().slice("style_header").to_string(),
            format!("- Tone: {}", style.tone),
            format!("- Empathy level: {}/10", style.empathy_level),
            format!("- Language style: {}", style.language_style.label()),
            format!("- Emoji: {}", style.emoji_usage.directive()),
        ];
        if persona.supports_multi_message() {
            lines.push(get_i18n().slice("multi_message").to_string());
        }
        lines.join("\n")
    }

    fn examples_section(&self, persona: &PersonaConfig, examples: &[ScoredExample]) -> Option<String> {
        if examples.is_empty() || self.example_limit == 0 {
            return None;
        }
        let header = fill(
            get_i18n().slice("examples_header"),
            &[("persona_name", persona.name.to_uppercase())],
        );
        let rendered = examples
            .iter()
            .take(self.example_limit)
            .map(|e| format!("User: {}\nResponse: {}", e.input, e.output))
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(format!("{}\n\n{}", header, rendered))
    }

    fn recent_section(&self, persona: &PersonaConfig, turns: &[Turn]) -> Option<String> {
        if turns.is_empty() || self.recent_turn_window == 0 {
            return None;
        }
        let start = turns.len().saturating_sub(self.recent_turn_window);
        Some(format!(
            "{}\n{}",
            get_i18n().slice("recent_header"),
            render_transcript(&turns[start..], &persona.name)
        ))
    }

    fn repetition_section(&self, last: &RepetitionState) -> String {
        let i18n = get_i18n();
        let mut lines = vec![i18n.slice("repetition_header").to_string()];

        if let Some(greeting) = &last.greeting {
            let alternatives = self
                .vocabulary
                .greeting_alternatives
                .iter()
                .filter(|g| !g.eq_ignore_ascii_case(greeting));
            lines.push(fill(
                i18n.slice("greeting_alert"),
                &[
                    ("greeting", greeting.clone()),
                    ("alternatives", quoted_list(alternatives)),
                ],
            ));
        }
        if let Some(pet_name) = &last.pet_name {
            let alternatives = self
                .vocabulary
                .pet_names
                .iter()
                .filter(|p| !p.eq_ignore_ascii_case(pet_name));
            lines.push(fill(
                i18n.slice("pet_name_alert"),
                &[
                    ("pet_name", pet_name.clone()),
                    ("alternatives", quoted_list(alternatives)),
                ],
            ));
        }
        if last.is_empty() {
            lines.push(i18n.slice("no_constraint").to_string());
        }
        lines.join("\n")
    }
}

fn context_section(inputs: &PromptInputs<'_>) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(summary) = inputs.summary.map(str::trim).filter(|s| !s.is_empty()) {
        lines.push(format!("- Conversation summary: {}", summary));
    }
    if let Some(context) = inputs.current_context.filter(|v| !v.is_null()) {
        lines.push(format!("- Current context: {}", context));
    }
    if let Some(user_id) = inputs.user_id {
        lines.push(format!("- User ID: {}", user_id));
    }
    if lines.is_empty() {
        return None;
    }
    Some(format!("{}\n{}", get_i18n().slice("context_header"), lines.join("\n")))
}

fn quoted_list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Interpolate a catalog slice; a template with an unknown placeholder is
/// returned verbatim.
pub(crate) fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let inputs: HashMap<&str, String> = vars.iter().cloned().collect();
    interpolate(template, &inputs).unwrap_or_else(|e| {
        log::warn!("Prompt template left uninterpolated: {}", e);
        template.to_string()
    })
}

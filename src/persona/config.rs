//! Persona definition types.
//!
//! A persona is immutable once loaded. Behavior that used to hinge on
//! comparing persona names is expressed through [`PersonaCapabilities`],
//! so a new persona opts in or out through configuration alone.

use serde::{Deserialize, Serialize};

/// Register the persona writes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageStyle {
    Formal,
    Casual,
    Professional,
    Hinglish,
}

impl LanguageStyle {
    /// Human-readable label for prompt rendering.
    pub fn label(self) -> &'static str {
        match self {
            LanguageStyle::Formal => "formal",
            LanguageStyle::Casual => "casual",
            LanguageStyle::Professional => "professional",
            LanguageStyle::Hinglish => "Hinglish (Hindi-English code-mixed)",
        }
    }
}

/// How freely the persona uses emoji.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmojiUsage {
    None,
    Minimal,
    Moderate,
    Frequent,
}

impl EmojiUsage {
    /// Prompt directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            EmojiUsage::None => "Do not use emoji.",
            EmojiUsage::Minimal => "Use an emoji only rarely.",
            EmojiUsage::Moderate => "Use emoji naturally, at most one or two per message.",
            EmojiUsage::Frequent => "Use emoji freely to express emotion.",
        }
    }
}

/// Conversation-style descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationStyle {
    /// Free-form tone label ("affectionate", "professional", ...).
    pub tone: String,
    /// 0 (detached) to 10 (maximally empathetic).
    pub empathy_level: u8,
    pub language_style: LanguageStyle,
    pub emoji_usage: EmojiUsage,
    /// Whether replies are split into several chat bubbles.
    #[serde(default)]
    pub multi_message: bool,
}

/// Opt-in behaviors of the synthesis pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaCapabilities {
    /// Run the planning pre-pass before the main completion.
    #[serde(default)]
    pub strategy_advisor: bool,
    /// Add the code-mixed language instruction.
    #[serde(default)]
    pub hinglish_style: bool,
    /// Add affectionate-term guidance and the dry-reply instruction.
    #[serde(default)]
    pub pet_names: bool,
    /// Derive the conversation tone from the user's mood instead of
    /// always using the style tone.
    #[serde(default)]
    pub mood_adaptive_tone: bool,
}

/// Hints for the strategy advisor about stories that should not be retold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyHints {
    #[serde(default)]
    pub story_markers: Vec<String>,
    #[serde(default)]
    pub alternate_topics: Vec<String>,
}

/// One persona as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Stable identifier used by callers (`"priya"`, `"therapist"`, ...).
    pub id: String,
    /// Display name used in prompts and transcripts.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Static system prompt text.
    pub system_prompt: String,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub backstory: Option<String>,
    pub style: ConversationStyle,
    #[serde(default)]
    pub capabilities: PersonaCapabilities,
    #[serde(default)]
    pub strategy: StrategyHints,
    /// Pattern set to draw examples from; defaults to the persona id.
    #[serde(default)]
    pub pattern_set: Option<String>,
    /// Categories of the pattern set to use; empty means all of them.
    #[serde(default)]
    pub pattern_categories: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
}

impl PersonaConfig {
    /// Whether replies should be segmented into several messages.
    pub fn supports_multi_message(&self) -> bool {
        self.style.multi_message
    }

    /// Name of the pattern set backing this persona.
    pub fn pattern_set(&self) -> &str {
        self.pattern_set.as_deref().unwrap_or(&self.id)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("persona id must not be empty".into());
        }
        if self.system_prompt.trim().is_empty() {
            return Err(format!("persona '{}' has an empty system prompt", self.id));
        }
        if self.style.empathy_level > 10 {
            return Err(format!(
                "persona '{}' has empathy_level {} (expected 0-10)",
                self.id, self.style.empathy_level
            ));
        }
        Ok(())
    }
}

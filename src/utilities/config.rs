//! Runtime configuration loaded from the environment.
//!
//! Persona definitions and the pattern library have their own loaders
//! ([`crate::persona::PersonaRegistry`], [`crate::training::PatternLibrary`]);
//! this module covers the tunables of the synthesis pipeline and the
//! chat-completion endpoint.

use std::str::FromStr;
use std::time::Duration;

use super::errors::ConfigError;

/// Tunables for [`crate::chat::ResponseSynthesizer`].
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Turns fetched from the conversation store per request.
    pub history_limit: usize,
    /// Summarize when the fetched history is longer than this.
    pub summarize_threshold: usize,
    /// Maximum scored examples spliced into the prompt.
    pub example_limit: usize,
    /// Examples must score strictly above this to be kept.
    pub min_relevance: f64,
    /// Recent turns quoted in the "DO NOT REPEAT" block.
    pub recent_turn_window: usize,
    /// Recent turns handed to the strategy advisor.
    pub strategy_turn_window: usize,
    /// Probability that the repetition guard strips instead of substituting.
    pub strip_probability: f64,
    /// Share of replies the companion prompt asks to carry no pet name.
    pub no_pet_name_share: f64,
    /// Deadline for summarizer and strategy calls.
    pub auxiliary_timeout: Duration,
    /// Deadline for the primary completion.
    pub completion_timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            summarize_threshold: 10,
            example_limit: 5,
            min_relevance: 0.1,
            recent_turn_window: 6,
            strategy_turn_window: 8,
            strip_probability: 0.6,
            no_pet_name_share: 0.6,
            auxiliary_timeout: Duration::from_secs(20),
            completion_timeout: Duration::from_secs(60),
        }
    }
}

impl SynthesisConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            history_limit: env_or("PERSONAS_HISTORY_LIMIT", defaults.history_limit),
            summarize_threshold: env_or(
                "PERSONAS_SUMMARIZE_THRESHOLD",
                defaults.summarize_threshold,
            ),
            example_limit: env_or("PERSONAS_EXAMPLE_LIMIT", defaults.example_limit),
            strip_probability: probability_or(
                "PERSONAS_STRIP_PROBABILITY",
                defaults.strip_probability,
            ),
            auxiliary_timeout: Duration::from_secs(env_or(
                "PERSONAS_AUX_TIMEOUT_SECS",
                defaults.auxiliary_timeout.as_secs(),
            )),
            completion_timeout: Duration::from_secs(env_or(
                "PERSONAS_LLM_TIMEOUT_SECS",
                defaults.completion_timeout.as_secs(),
            )),
            ..defaults
        }
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer token; `None` makes every call fail fast.
    pub api_key: Option<String>,
    /// API base URL (without `/chat/completions`).
    pub base_url: String,
    /// Model for the primary reply.
    pub model: String,
    /// Model for the strategy pre-pass.
    pub strategy_model: String,
    /// Retries on 429 / 5xx.
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            strategy_model: "gpt-4o-mini".into(),
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    /// Load from `OPENAI_*` environment variables.
    pub fn from_env() -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            strategy_model: std::env::var("OPENAI_STRATEGY_MODEL")
                .unwrap_or_else(|_| model.clone()),
            model,
            max_retries: env_or("OPENAI_MAX_RETRIES", 2),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// A probability from `key`, clamped to `[0, 1]`. NaN and infinities
/// parse as `f64` but are rejected like any other garbage.
fn probability_or(key: &str, default: f64) -> f64 {
    let value = env_or(key, default);
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        log::warn!("Ignoring non-finite {}={}", key, value);
        default
    }
}

impl SynthesisConfig {
    /// Reject values no pipeline stage can work with.
    ///
    /// # Errors
    /// [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("strip_probability", self.strip_probability),
            ("no_pet_name_share", self.no_pet_name_share),
            ("min_relevance", self.min_relevance),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.strip_probability) {
            return Err(ConfigError::Validation(format!(
                "strip_probability must be within [0, 1], got {}",
                self.strip_probability
            )));
        }
        Ok(())
    }
}

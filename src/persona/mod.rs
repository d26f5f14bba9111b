//! Persona definitions.
//!
//! Personas are data: a YAML file lists each persona's prompt, conversation
//! style and capability flags, plus the vocabulary the repetition guard
//! works from. The registry is built once at startup and shared read-only.
//!
//! ```text
//! personas.yaml ──► PersonaRegistry ──► PersonaConfig (per request)
//!                        └────────────► Vocabulary (FeatureExtractor)
//! ```

pub mod config;
pub mod registry;

pub use config::{
    ConversationStyle, EmojiUsage, LanguageStyle, PersonaCapabilities, PersonaConfig,
    StrategyHints,
};
pub use registry::PersonaRegistry;

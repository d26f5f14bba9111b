//! Chat module: turning one user message into a persona reply.
//!
//! ```text
//! User message
//!   → FeatureExtractor over the last persona turn (greeting, pet name)
//!   → StrategyAdvisor (planning pre-pass, capability-gated)
//!   → PromptComposer (persona + style + examples + context + constraints)
//!   → ChatCompletion
//!   → RepetitionGuard (strip or substitute repeated tokens)
//!   → segment (multi-message personas)
//! ```
//!
//! [`ResponseSynthesizer`] drives the whole pipeline. [`ConversationAnalyzer`]
//! maintains the mood/tone context between messages.

pub mod context;
pub mod features;
pub mod prompt;
pub mod repetition;
pub mod segmenter;
pub mod strategy;
pub mod synthesizer;
pub mod variety;

pub use context::{
    ContextStore, ConversationAnalyzer, ConversationContext, InMemoryContextStore, InputAnalysis,
    Mood,
};
pub use features::{FeatureExtractor, GreetingMatch, PetNameMatch, Vocabulary};
pub use prompt::{PromptComposer, PromptInputs};
pub use repetition::{RepairPolicy, RepetitionGuard, RepetitionState};
pub use segmenter::{segment, MULTI_MESSAGE_DELIMITER};
pub use strategy::StrategyAdvisor;
pub use synthesizer::{
    ReplyMessage, ResponseSource, ResponseSynthesizer, SynthesisRequest, SynthesizedResponse,
};
pub use variety::VarietyReport;

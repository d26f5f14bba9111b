//! # Personas
//!
//! Conversational persona backend. Routes a user message to one of several
//! LLM-backed personas (a Hinglish-texting companion and professional
//! advisors), enriches the prompt with scored examples, history summary and
//! explicit repetition constraints, and repairs the model's reply so that
//! consecutive replies do not reuse the same greeting or pet name.
//!
//! ```text
//! persona  ─ PersonaRegistry (YAML)
//! training ─ PatternLibrary, relevance scoring, deterministic fallback
//! chat     ─ features, repetition guard, prompt, strategy, synthesizer
//! llm      ─ ChatCompletion (OpenAI-compatible), Summarizer
//! memory   ─ Turn, ConversationStore
//! server   ─ axum REST surface
//! ```

pub mod chat;
pub mod llm;
pub mod memory;
pub mod persona;
pub mod server;
pub mod training;
pub mod utilities;

pub use chat::{
    ConversationAnalyzer, FeatureExtractor, ReplyMessage, ResponseSynthesizer, RepetitionGuard,
    SynthesisRequest, SynthesizedResponse,
};
pub use llm::{ChatCompletion, LlmSummarizer, OpenAICompletion, Summarizer};
pub use memory::{ConversationStore, InMemoryConversationStore, Turn};
pub use persona::{PersonaConfig, PersonaRegistry};
pub use training::PatternLibrary;

/// Library version.
pub const VERSION: &str = "0.3.0";

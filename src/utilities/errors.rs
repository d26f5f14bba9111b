//! Error types shared across the persona pipeline.
//!
//! Only [`ConfigError`] ever escapes [`crate::chat::ResponseSynthesizer`];
//! the others are recovered inside the pipeline and logged.

use thiserror::Error;

/// Deployment / configuration defects. Fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Lookup of a persona id that is not in the registry.
    #[error("Persona not found: {0}")]
    UnknownPersona(String),

    /// YAML parsing failed (persona definitions).
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing failed (pattern library, prompt catalog).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally valid but semantically broken configuration.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors from a chat-completion call-out.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured.
    #[error("LLM API key not set. Set OPENAI_API_KEY")]
    MissingApiKey,

    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered 429 on every attempt.
    #[error("Rate limited by provider ({0} attempts)")]
    RateLimited(u32),

    /// Non-success status from the provider.
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not a usable completion.
    #[error("Malformed completion response: {0}")]
    Malformed(String),

    /// The call exceeded its deadline.
    #[error("LLM call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors from the conversation or context stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unavailable or failed.
    #[error("Store backend error: {message}")]
    Backend { message: String },
}

/// Errors from the summarizer collaborator.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Nothing to summarize.
    #[error("No turns to summarize")]
    Empty,

    /// The underlying completion failed.
    #[error("Could not generate conversation summary: {0}")]
    Llm(#[from] LlmError),
}

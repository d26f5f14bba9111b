//! Persona HTTP server binary.
//!
//! # Environment Variables
//!
//! - `PORT`: HTTP port (default: 8080)
//! - `PERSONAS_CONFIG`: persona YAML (default: embedded definitions)
//! - `PERSONAS_PATTERNS`: pattern library JSON (default: embedded library)
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`, `OPENAI_STRATEGY_MODEL`
//! - `PERSONAS_*` tunables, see `SynthesisConfig::from_env`
//! - `RUST_LOG`: Tracing filter (default: "info,personas=debug")
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;

use personas::chat::{InMemoryContextStore, ResponseSynthesizer};
use personas::llm::{LlmSummarizer, OpenAICompletion};
use personas::memory::InMemoryConversationStore;
use personas::persona::PersonaRegistry;
use personas::server::{app_router, AppState};
use personas::training::PatternLibrary;
use personas::utilities::config::{LlmConfig, SynthesisConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,personas=debug".into()),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{}", port);

    let registry = PersonaRegistry::load(None)
        .context("loading persona definitions")?;
    let patterns = PatternLibrary::load(None)
        .context("loading pattern library")?;

    let llm_config = LlmConfig::from_env();
    if llm_config.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; every reply will use the pattern fallback");
    }
    let strategy_model = llm_config.strategy_model.clone();
    let llm = Arc::new(OpenAICompletion::new(llm_config).context("building LLM client")?);
    let summarizer = Arc::new(LlmSummarizer::new(llm.clone()));

    let conversations = Arc::new(InMemoryConversationStore::default());
    let synthesizer = ResponseSynthesizer::new(
        Arc::new(registry),
        Arc::new(patterns),
        llm,
        summarizer,
        conversations.clone(),
        SynthesisConfig::from_env(),
    )
    .context("building response synthesizer")?
    .with_strategy_model(strategy_model);

    let state = AppState::new(
        Arc::new(synthesizer),
        conversations,
        Arc::new(InMemoryContextStore::new()),
    );
    let app = app_router(state);

    tracing::info!("personas server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET /health: liveness probe");
    tracing::info!("  GET /personas: persona catalog");
    tracing::info!("  POST /personas/conversation: reply to a user message");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}

//! Axum route handlers for the persona HTTP server.
//!
//! # Routes
//!
//! - `GET /health`: Liveness probe
//! - `GET /personas`: List personas in config order
//! - `GET /personas/:id/prompt`: Static system prompt of a persona
//! - `GET /personas/:id/greeting`: Opening greeting of a persona
//! - `POST /personas/conversation`: Synthesize a reply and record the exchange
//! - `GET /personas/context/:user_id/:persona_id`: Current conversation context
//! - `POST /personas/analyze`: Mood / contradiction analysis of a message

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat::{
    ContextStore, ConversationAnalyzer, ResponseSynthesizer, SynthesisRequest,
    SynthesizedResponse,
};
use crate::memory::{ConversationStore, Turn};
use crate::utilities::errors::ConfigError;

type ApiError = (StatusCode, Json<Value>);

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<ResponseSynthesizer>,
    /// Where exchanges are recorded; the synthesizer reads history from the same store.
    pub conversations: Arc<dyn ConversationStore>,
    pub contexts: Arc<dyn ContextStore>,
    pub analyzer: ConversationAnalyzer,
}

impl AppState {
    pub fn new(
        synthesizer: Arc<ResponseSynthesizer>,
        conversations: Arc<dyn ConversationStore>,
        contexts: Arc<dyn ContextStore>,
    ) -> Self {
        Self {
            synthesizer,
            conversations,
            contexts,
            analyzer: ConversationAnalyzer,
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/personas", get(list_personas_handler))
        .route("/personas/:id/prompt", get(prompt_handler))
        .route("/personas/:id/greeting", get(greeting_handler))
        .route("/personas/conversation", post(conversation_handler))
        .route(
            "/personas/context/:user_id/:persona_id",
            get(context_handler),
        )
        .route("/personas/analyze", post(analyze_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

fn config_error(err: ConfigError) -> ApiError {
    match err {
        ConfigError::UnknownPersona(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        other => {
            log::error!("Configuration error while serving request: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "personas",
    }))
}

#[derive(Debug, Serialize)]
struct PersonaSummary<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    greeting: Option<&'a str>,
    multi_message: bool,
}

/// GET /personas: every persona, in configuration order.
async fn list_personas_handler(State(state): State<AppState>) -> impl IntoResponse {
    let personas: Vec<_> = state
        .synthesizer
        .registry()
        .available()
        .iter()
        .map(|p| PersonaSummary {
            id: &p.id,
            name: &p.name,
            description: &p.description,
            greeting: p.greeting.as_deref(),
            multi_message: p.supports_multi_message(),
        })
        .collect();
    Json(serde_json::json!({ "personas": personas }))
}

/// GET /personas/:id/prompt
async fn prompt_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let prompt = state
        .synthesizer
        .registry()
        .system_prompt(&id)
        .map_err(config_error)?;
    Ok(Json(serde_json::json!({ "id": id, "system_prompt": prompt })))
}

/// GET /personas/:id/greeting
async fn greeting_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let greeting = state
        .synthesizer
        .registry()
        .greeting(&id)
        .map_err(config_error)?;
    Ok(Json(serde_json::json!({ "id": id, "greeting": greeting })))
}

#[derive(Debug, Deserialize)]
struct ConversationRequest {
    message: String,
    persona_id: String,
    #[serde(flatten)]
    context: SynthesisRequest,
}

/// POST /personas/conversation
///
/// Synthesizes the reply, then (when a user id is given) appends both turns
/// to the conversation store and folds the exchange into the conversation
/// context. Store failures are logged; the reply is still returned.
async fn conversation_handler(
    State(state): State<AppState>,
    Json(request): Json<ConversationRequest>,
) -> Result<Json<SynthesizedResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let mut response = state
        .synthesizer
        .synthesize(&request.message, &request.persona_id, &request.context)
        .await
        .map_err(config_error)?;

    let Some(user_id) = request.context.user_id.as_deref() else {
        return Ok(Json(response));
    };
    let persona = state
        .synthesizer
        .registry()
        .get(&request.persona_id)
        .map_err(config_error)?;
    let reply = response.message.transcript_text();

    if let Err(e) = state
        .conversations
        .append_all(
            user_id,
            &persona.id,
            vec![Turn::user(request.message.clone()), Turn::persona(reply.clone())],
        )
        .await
    {
        log::warn!("Could not record exchange for {}/{}: {}", user_id, persona.id, e);
    }

    match state
        .analyzer
        .update_context(state.contexts.as_ref(), user_id, persona, &request.message, &reply)
        .await
    {
        Ok(context) => match serde_json::to_value(&context) {
            Ok(value) => response.conversation_context = Some(value),
            Err(e) => log::warn!("Could not serialize conversation context: {}", e),
        },
        Err(e) => log::warn!("Could not update context for {}/{}: {}", user_id, persona.id, e),
    }

    Ok(Json(response))
}

/// GET /personas/context/:user_id/:persona_id
async fn context_handler(
    State(state): State<AppState>,
    Path((user_id, persona_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .synthesizer
        .registry()
        .get(&persona_id)
        .map_err(config_error)?;
    match state.contexts.get(&user_id, &persona_id).await {
        Ok(Some(context)) => Ok(Json(serde_json::json!({ "context": context }))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No context for {}/{}", user_id, persona_id),
        )),
        Err(e) => Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    message: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    persona_id: Option<String>,
}

/// POST /personas/analyze
async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    let context = match (&request.user_id, &request.persona_id) {
        (Some(user_id), Some(persona_id)) => state
            .contexts
            .get(user_id, persona_id)
            .await
            .unwrap_or_else(|e| {
                log::warn!("Context unavailable for analysis: {}", e);
                None
            }),
        _ => None,
    };

    let analyzer = state.analyzer;
    let analysis = analyzer.analyze_input(&request.message);
    let transition = analyzer.detect_mood_transition(context.as_ref(), analysis.mood);
    let contradiction = analyzer.detect_semantic_contradiction(&request.message);
    let modifications = analyzer.response_modifications(context.as_ref(), &request.message);

    Ok(Json(serde_json::json!({
        "analysis": analysis,
        "mood_transition": transition,
        "contradiction": contradiction,
        "modifications": modifications,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{ScriptedCompletion, StubSummarizer};
    use crate::chat::InMemoryContextStore;
    use crate::memory::InMemoryConversationStore;
    use crate::persona::PersonaRegistry;
    use crate::training::PatternLibrary;
    use crate::utilities::config::SynthesisConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const BODY_LIMIT: usize = 64 * 1024;

    fn test_state(llm: ScriptedCompletion) -> (AppState, Arc<InMemoryConversationStore>) {
        let conversations = Arc::new(InMemoryConversationStore::default());
        let synthesizer = ResponseSynthesizer::new(
            Arc::new(PersonaRegistry::embedded().unwrap()),
            Arc::new(PatternLibrary::embedded().unwrap()),
            Arc::new(llm),
            Arc::new(StubSummarizer::ok("summary")),
            conversations.clone(),
            SynthesisConfig::default(),
        )
        .unwrap()
        .with_rng_seed(1);
        let state = AppState::new(
            Arc::new(synthesizer),
            conversations.clone(),
            Arc::new(InMemoryContextStore::new()),
        );
        (state, conversations)
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _) = test_state(ScriptedCompletion::failing());
        let app = app_router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], "personas");
    }

    #[tokio::test]
    async fn test_list_personas_in_config_order() {
        let (state, _) = test_state(ScriptedCompletion::failing());
        let response = app_router(state)
            .oneshot(Request::builder().uri("/personas").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        let ids: Vec<_> = json["personas"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["priya", "therapist", "dietician", "career"]);
        assert_eq!(json["personas"][0]["multi_message"], true);
    }

    #[tokio::test]
    async fn test_unknown_persona_is_404() {
        let (state, _) = test_state(ScriptedCompletion::failing());
        let app = app_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/personas/pirate/prompt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = read_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("pirate"));

        let response = app
            .oneshot(post_json(
                "/personas/conversation",
                serde_json::json!({"message": "hi", "persona_id": "pirate"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conversation_records_exchange_and_context() {
        let (state, conversations) = test_state(ScriptedCompletion::replying([
            "Oh no, that sounds rough. What happened at work?",
        ]));
        let app = app_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/personas/conversation",
                serde_json::json!({
                    "message": "I'm so stressed about work",
                    "persona_id": "therapist",
                    "user_id": "u-42",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["message"], "Oh no, that sounds rough. What happened at work?");
        assert_eq!(json["source"], "llm");
        assert_eq!(json["conversation_context"]["current_mood"], "upset");

        let history = conversations.history("u-42", "therapist", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "I'm so stressed about work");
        assert!(history[1].is_persona());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/personas/context/u-42/therapist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["context"]["topic_history"], serde_json::json!(["work"]));
        assert_eq!(json["context"]["conversation_tone"], "warm");
    }

    #[tokio::test]
    async fn test_conversation_falls_back_when_llm_down() {
        let (state, _) = test_state(ScriptedCompletion::failing());
        let response = app_router(state)
            .oneshot(post_json(
                "/personas/conversation",
                serde_json::json!({"message": "Good morning", "persona_id": "priya"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["source"], "pattern");
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (state, _) = test_state(ScriptedCompletion::failing());
        let response = app_router(state)
            .oneshot(post_json(
                "/personas/conversation",
                serde_json::json!({"message": "  ", "persona_id": "priya"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_endpoint() {
        let (state, _) = test_state(ScriptedCompletion::failing());
        let response = app_router(state)
            .oneshot(post_json(
                "/personas/analyze",
                serde_json::json!({"message": "I'm sad I got the promotion"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["analysis"]["mood"], "happy");
        assert_eq!(json["contradiction"]["kind"], "emotional_success");
        assert_eq!(json["modifications"]["response_style"], "questioning");
        assert!(json["mood_transition"].is_null());
    }
}

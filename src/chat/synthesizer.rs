//! Response Synthesizer: the per-message orchestration.
//!
//! ```text
//! user message
//!   → fetch history (store)
//!   → summarize long histories (optional, non-fatal)
//!   → score pattern examples
//!   → strategy pre-pass (capability-gated, non-fatal)
//!   → compose enriched system prompt
//!   → primary completion
//!       ok  → repetition guard → segment (multi-message personas)
//!       err → first matching pattern, else the fixed apology
//! ```
//!
//! Only an unknown persona id escapes as an error; every other failure is
//! absorbed here so callers always get a message-shaped response.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::features::FeatureExtractor;
use super::prompt::{PromptComposer, PromptInputs};
use super::repetition::{RepairPolicy, RepetitionGuard};
use super::segmenter::segment;
use super::strategy::StrategyAdvisor;
use crate::llm::{ChatCompletion, Summarizer};
use crate::memory::{last_persona_turn, ConversationStore, Turn};
use crate::persona::{PersonaConfig, PersonaRegistry};
use crate::training::{
    find_matching_pattern, select_random_response, select_relevant_examples, PatternLibrary,
};
use crate::utilities::config::SynthesisConfig;
use crate::utilities::errors::{ConfigError, LlmError};
use crate::utilities::i18n::get_i18n;
use crate::utilities::string_utils::preview;

/// Optional caller-supplied context for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Needed to fetch history; without it the persona answers cold.
    #[serde(default)]
    pub user_id: Option<String>,
    /// A summary computed earlier; skips summarization when present.
    #[serde(default)]
    pub conversation_summary: Option<String>,
    /// Free-form context, passed through to the prompt and the response.
    #[serde(default)]
    pub current_context: Option<Value>,
}

impl SynthesisRequest {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }
}

/// One reply, or several chat bubbles for multi-message personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyMessage {
    Single(String),
    Multiple(Vec<String>),
}

impl ReplyMessage {
    fn from_segments(mut segments: Vec<String>) -> Self {
        if segments.len() == 1 {
            ReplyMessage::Single(segments.remove(0))
        } else {
            ReplyMessage::Multiple(segments)
        }
    }

    /// The bubbles in order.
    pub fn parts(&self) -> Vec<&str> {
        match self {
            ReplyMessage::Single(s) => vec![s.as_str()],
            ReplyMessage::Multiple(parts) => parts.iter().map(String::as_str).collect(),
        }
    }

    /// Text to persist as the persona's turn, bubbles on separate lines.
    pub fn transcript_text(&self) -> String {
        self.parts().join("\n")
    }
}

/// Which path produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Llm,
    Pattern,
    Apology,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedResponse {
    pub message: ReplyMessage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<Value>,
    pub source: ResponseSource,
}

pub struct ResponseSynthesizer {
    registry: Arc<PersonaRegistry>,
    patterns: Arc<PatternLibrary>,
    llm: Arc<dyn ChatCompletion>,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn ConversationStore>,
    guard: RepetitionGuard,
    composer: PromptComposer,
    advisor: StrategyAdvisor,
    config: SynthesisConfig,
    model: Option<String>,
    rng: Mutex<StdRng>,
}

impl ResponseSynthesizer {
    pub fn new(
        registry: Arc<PersonaRegistry>,
        patterns: Arc<PatternLibrary>,
        llm: Arc<dyn ChatCompletion>,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<dyn ConversationStore>,
        config: SynthesisConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let vocabulary = registry.vocabulary().clone();
        let extractor = Arc::new(FeatureExtractor::new(vocabulary.clone())?);
        let guard = RepetitionGuard::new(
            extractor,
            RepairPolicy {
                strip_probability: config.strip_probability,
            },
        );
        let composer = PromptComposer::new(vocabulary.clone(), &config);
        let advisor = StrategyAdvisor::new(llm.clone(), vocabulary.pet_names, &config);

        Ok(Self {
            registry,
            patterns,
            llm,
            summarizer,
            store,
            guard,
            composer,
            advisor,
            config,
            model: None,
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Model for the primary completion; the client default otherwise.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Model for the strategy pre-pass.
    pub fn with_strategy_model(mut self, model: impl Into<String>) -> Self {
        self.advisor = self.advisor.with_model(model);
        self
    }

    /// Make example selection and repair decisions reproducible.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &RepetitionGuard {
        &self.guard
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Produce the persona's reply to `message`.
    ///
    /// # Errors
    /// Only [`ConfigError::UnknownPersona`]; generation failures fall back
    /// to pattern matching or the fixed apology.
    pub async fn synthesize(
        &self,
        message: &str,
        persona_id: &str,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedResponse, ConfigError> {
        let persona = self.registry.get(persona_id)?;
        log::info!(
            "Synthesizing reply for persona={} user={:?}: {}",
            persona.id,
            request.user_id,
            preview(message, 80)
        );

        let history = self.fetch_history(persona, request).await;
        let summary = self.summary_for(persona, request, &history).await;

        let categories = self.patterns.all_patterns(persona);
        let examples = {
            let mut rng = self.rng.lock();
            select_relevant_examples(
                message,
                &categories,
                self.config.example_limit,
                self.config.min_relevance,
                &mut *rng,
            )
        };

        let previous_reply = last_persona_turn(&history).map(|t| t.text.as_str());
        // Nothing to analyse before the persona has spoken.
        let strategy = if persona.capabilities.strategy_advisor && previous_reply.is_some() {
            self.advisor.generate(persona, &history).await
        } else {
            None
        };

        let last_reply = self.guard.state_of(previous_reply);
        let prompt = self.composer.compose(&PromptInputs {
            persona,
            examples: &examples,
            summary: summary.as_deref(),
            current_context: request.current_context.as_ref(),
            user_id: request.user_id.as_deref(),
            strategy: strategy.as_deref(),
            recent_turns: &history,
            last_reply: &last_reply,
        });
        log::debug!("Composed prompt for {} ({} chars)", persona.id, prompt.len());

        match self.complete(message, &prompt).await {
            Ok(raw) => {
                let repaired = {
                    let mut rng = self.rng.lock();
                    self.guard.reconcile(&raw, previous_reply, &mut *rng)
                };
                if repaired != raw {
                    log::debug!(
                        "Repetition guard rewrote reply: {:?} -> {:?}",
                        preview(&raw, 60),
                        preview(&repaired, 60)
                    );
                }
                let message = if persona.supports_multi_message() {
                    ReplyMessage::from_segments(segment(&repaired))
                } else {
                    ReplyMessage::Single(repaired)
                };
                Ok(SynthesizedResponse {
                    message,
                    emotions: Vec::new(),
                    follow_up_questions: Vec::new(),
                    conversation_context: request.current_context.clone(),
                    source: ResponseSource::Llm,
                })
            }
            Err(e) => {
                log::error!(
                    "Primary completion failed for {}; using fallback: {}",
                    persona.id,
                    e
                );
                Ok(self.fallback(message, persona, request))
            }
        }
    }

    async fn fetch_history(&self, persona: &PersonaConfig, request: &SynthesisRequest) -> Vec<Turn> {
        let Some(user_id) = request.user_id.as_deref() else {
            return Vec::new();
        };
        match self
            .store
            .history(user_id, &persona.id, self.config.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                log::warn!(
                    "History unavailable for {}/{}; continuing without it: {}",
                    user_id,
                    persona.id,
                    e
                );
                Vec::new()
            }
        }
    }

    async fn summary_for(
        &self,
        persona: &PersonaConfig,
        request: &SynthesisRequest,
        history: &[Turn],
    ) -> Option<String> {
        if let Some(summary) = request
            .conversation_summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            return Some(summary.to_string());
        }
        if history.len() <= self.config.summarize_threshold {
            return None;
        }

        let call = self.summarizer.summarize(history, &persona.name);
        match tokio::time::timeout(self.config.auxiliary_timeout, call).await {
            Ok(Ok(summary)) => Some(summary),
            Ok(Err(e)) => {
                log::warn!("Summarization failed for {}: {}", persona.id, e);
                None
            }
            Err(_) => {
                log::warn!(
                    "Summarization for {} timed out after {:?}",
                    persona.id,
                    self.config.auxiliary_timeout
                );
                None
            }
        }
    }

    async fn complete(&self, message: &str, prompt: &str) -> Result<String, LlmError> {
        let call = self.llm.complete(message, prompt, self.model.as_deref(), &[]);
        let text = tokio::time::timeout(self.config.completion_timeout, call)
            .await
            .map_err(|_| LlmError::Timeout(self.config.completion_timeout))??;
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::Malformed("empty completion".into()));
        }
        Ok(text.to_string())
    }

    fn fallback(
        &self,
        message: &str,
        persona: &PersonaConfig,
        request: &SynthesisRequest,
    ) -> SynthesizedResponse {
        let categories = self.patterns.all_patterns(persona);
        match find_matching_pattern(message, &categories) {
            Some(pattern) => {
                let reply = {
                    let mut rng = self.rng.lock();
                    select_random_response(&pattern.output, &mut *rng)
                };
                log::info!("Fallback matched pattern {:?}", pattern.input);
                SynthesizedResponse {
                    message: ReplyMessage::Single(reply),
                    emotions: pattern.emotions.clone(),
                    follow_up_questions: pattern.follow_up_questions.clone(),
                    conversation_context: request.current_context.clone(),
                    source: ResponseSource::Pattern,
                }
            }
            None => SynthesizedResponse {
                message: ReplyMessage::Single(get_i18n().errors("fallback_apology").to_string()),
                emotions: Vec::new(),
                follow_up_questions: Vec::new(),
                conversation_context: request.current_context.clone(),
                source: ResponseSource::Apology,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{FailingStore, ScriptedCompletion, StubSummarizer};
    use crate::chat::VarietyReport;
    use crate::memory::InMemoryConversationStore;

    struct Harness {
        llm: Arc<ScriptedCompletion>,
        store: Arc<InMemoryConversationStore>,
        summarizer: Arc<StubSummarizer>,
        synthesizer: ResponseSynthesizer,
    }

    fn harness(llm: ScriptedCompletion, summarizer: StubSummarizer) -> Harness {
        let llm = Arc::new(llm);
        let store = Arc::new(InMemoryConversationStore::default());
        let summarizer = Arc::new(summarizer);
        let synthesizer = ResponseSynthesizer::new(
            Arc::new(PersonaRegistry::embedded().unwrap()),
            Arc::new(PatternLibrary::embedded().unwrap()),
            llm.clone(),
            summarizer.clone(),
            store.clone(),
            SynthesisConfig::default(),
        )
        .unwrap()
        .with_rng_seed(7);
        Harness {
            llm,
            store,
            summarizer,
            synthesizer,
        }
    }

    #[tokio::test]
    async fn test_unknown_persona_is_config_error() {
        let h = harness(ScriptedCompletion::failing(), StubSummarizer::ok("s"));
        let err = h
            .synthesizer
            .synthesize("hi", "pirate", &SynthesisRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPersona(id) if id == "pirate"));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_pattern() {
        let h = harness(ScriptedCompletion::failing(), StubSummarizer::ok("s"));
        let response = h
            .synthesizer
            .synthesize("Good morning", "priya", &SynthesisRequest::default())
            .await
            .unwrap();
        assert_eq!(response.source, ResponseSource::Pattern);

        let library = PatternLibrary::embedded().unwrap();
        let registry = PersonaRegistry::embedded().unwrap();
        let priya = registry.get("priya").unwrap();
        let entry = library
            .patterns_for(priya, "greetings")
            .iter()
            .find(|p| p.input == "Good morning")
            .unwrap();
        let ReplyMessage::Single(text) = &response.message else {
            panic!("expected a single message");
        };
        assert!(entry.output.candidates().contains(text));
        assert_eq!(response.follow_up_questions, entry.follow_up_questions);
        assert_eq!(response.emotions, entry.emotions);
    }

    #[tokio::test]
    async fn test_no_pattern_returns_apology() {
        let h = harness(ScriptedCompletion::failing(), StubSummarizer::ok("s"));
        let response = h
            .synthesizer
            .synthesize("zzzz", "priya", &SynthesisRequest::default())
            .await
            .unwrap();
        assert_eq!(response.source, ResponseSource::Apology);
        assert_eq!(
            response.message,
            ReplyMessage::Single("I'm having trouble right now, but I'm here for you! ❤️".into())
        );
    }

    #[tokio::test]
    async fn test_repeated_pet_name_is_repaired() {
        let h = harness(
            ScriptedCompletion::replying(["- Skip the greeting.", "Hey baby! I'm good"]),
            StubSummarizer::ok("s"),
        );
        h.store
            .append_all(
                "u1",
                "priya",
                vec![Turn::persona("Hey baby, how's it going?"), Turn::user("how are you?")],
            )
            .await
            .unwrap();

        let response = h
            .synthesizer
            .synthesize("how are you?", "priya", &SynthesisRequest::for_user("u1"))
            .await
            .unwrap();
        let text = response.message.transcript_text();
        assert_eq!(response.source, ResponseSource::Llm);
        assert!(!text.is_empty());
        assert!(!text.to_lowercase().starts_with("hey baby"));
        assert_ne!(
            h.synthesizer.guard().extractor().extract_pet_name(&text).as_deref(),
            Some("baby")
        );

        let calls = h.llm.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].user_message, "how are you?");
        assert!(calls[1].system_prompt.contains("pet name \"baby\""));
        assert!(calls[1].system_prompt.contains("- Skip the greeting."));
    }

    #[tokio::test]
    async fn test_multi_message_reply_is_segmented() {
        let h = harness(
            ScriptedCompletion::replying(["Arre wait||I just saw this||kya hua?"]),
            StubSummarizer::ok("s"),
        );
        let response = h
            .synthesizer
            .synthesize("I failed my exam", "priya", &SynthesisRequest::default())
            .await
            .unwrap();
        // no persona turn yet, so no strategy pre-pass
        assert_eq!(h.llm.calls().len(), 1);
        assert_eq!(
            response.message,
            ReplyMessage::Multiple(vec![
                "Arre wait".into(),
                "I just saw this".into(),
                "kya hua?".into()
            ])
        );
    }

    #[tokio::test]
    async fn test_consecutive_replies_never_share_tokens() {
        let replies = [
            "Hey baby! Kaisa tha din?",
            "- Vary the opener.",
            "Hey baby!||kya kar rahe ho?",
            "- Drop the pet name.",
            "Hey baby, I love you so much, baby!",
            "- Change the topic.",
            "Hey baby! Good night, baby.",
            "- Keep it short.",
            "Hey baby, so sleepy",
        ];
        let h = harness(ScriptedCompletion::replying(replies), StubSummarizer::ok("s"));
        let request = SynthesisRequest::for_user("u5");
        let messages = ["hi", "what's up", "I missed you", "going to sleep", "night"];

        for message in messages {
            let response = h.synthesizer.synthesize(message, "priya", &request).await.unwrap();
            assert_eq!(response.source, ResponseSource::Llm);
            h.store
                .append_all(
                    "u5",
                    "priya",
                    vec![
                        Turn::user(message),
                        Turn::persona(response.message.transcript_text()),
                    ],
                )
                .await
                .unwrap();
        }

        let calls = h.llm.calls();
        assert_eq!(calls.len(), replies.len());
        // first message has no persona turn to analyse
        assert_eq!(calls[0].user_message, "hi");

        let persona_turns: Vec<String> = h
            .store
            .history("u5", "priya", 50)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.is_persona())
            .map(|t| t.text)
            .collect();
        assert_eq!(persona_turns.len(), messages.len());
        assert!(persona_turns.iter().all(|t| !t.trim().is_empty()));

        let report = VarietyReport::from_replies(h.synthesizer.guard().extractor(), &persona_turns);
        assert!(report.is_repetition_free(), "{:?}", persona_turns);
        // the raw script would have repeated on every adjacent pair
        let raw: Vec<String> = replies.iter().step_by(2).map(|r| r.to_string()).collect();
        let raw_report = VarietyReport::from_replies(h.synthesizer.guard().extractor(), &raw);
        assert_eq!(raw_report.consecutive_pet_name_repetition, messages.len() - 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_at_construction() {
        let mut config = SynthesisConfig::default();
        config.strip_probability = f64::NAN;
        let result = ResponseSynthesizer::new(
            Arc::new(PersonaRegistry::embedded().unwrap()),
            Arc::new(PatternLibrary::embedded().unwrap()),
            Arc::new(ScriptedCompletion::failing()),
            Arc::new(StubSummarizer::ok("s")),
            Arc::new(InMemoryConversationStore::default()),
            config,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_professional_persona_skips_strategy_and_segmenting() {
        let h = harness(
            ScriptedCompletion::replying(["Let's look at your options.||First, breathe."]),
            StubSummarizer::ok("s"),
        );
        let ctx = serde_json::json!({"topic": "career"});
        let request = SynthesisRequest {
            current_context: Some(ctx.clone()),
            ..Default::default()
        };
        let response = h
            .synthesizer
            .synthesize("Should I switch jobs?", "career", &request)
            .await
            .unwrap();
        assert_eq!(h.llm.calls().len(), 1);
        assert_eq!(
            response.message,
            ReplyMessage::Single("Let's look at your options.||First, breathe.".into())
        );
        assert_eq!(response.conversation_context, Some(ctx));
    }

    #[tokio::test]
    async fn test_long_history_is_summarized() {
        let h = harness(
            ScriptedCompletion::replying(["ok", "Sounds good."]),
            StubSummarizer::ok("User is preparing for exams."),
        );
        let turns: Vec<Turn> = (0..12).map(|i| Turn::user(format!("msg {}", i))).collect();
        h.store.append_all("u2", "therapist", turns).await.unwrap();

        h.synthesizer
            .synthesize("hello", "therapist", &SynthesisRequest::for_user("u2"))
            .await
            .unwrap();
        assert_eq!(h.summarizer.calls(), 1);
        let prompt = &h.llm.calls()[0].system_prompt;
        assert!(prompt.contains("- Conversation summary: User is preparing for exams."));
    }

    #[tokio::test]
    async fn test_summarizer_failure_is_non_fatal() {
        let h = harness(
            ScriptedCompletion::replying(["I'm listening."]),
            StubSummarizer::failing(),
        );
        let turns: Vec<Turn> = (0..11).map(|i| Turn::user(format!("msg {}", i))).collect();
        h.store.append_all("u3", "therapist", turns).await.unwrap();

        let response = h
            .synthesizer
            .synthesize("hello", "therapist", &SynthesisRequest::for_user("u3"))
            .await
            .unwrap();
        assert_eq!(response.source, ResponseSource::Llm);
        assert!(!h.llm.calls()[0].system_prompt.contains("Conversation summary"));
    }

    #[tokio::test]
    async fn test_store_failure_is_non_fatal() {
        let llm = Arc::new(ScriptedCompletion::replying(["Take it one step at a time."]));
        let synthesizer = ResponseSynthesizer::new(
            Arc::new(PersonaRegistry::embedded().unwrap()),
            Arc::new(PatternLibrary::embedded().unwrap()),
            llm.clone(),
            Arc::new(StubSummarizer::ok("s")),
            Arc::new(FailingStore),
            SynthesisConfig::default(),
        )
        .unwrap();
        let response = synthesizer
            .synthesize("I'm anxious", "therapist", &SynthesisRequest::for_user("u4"))
            .await
            .unwrap();
        assert_eq!(
            response.message,
            ReplyMessage::Single("Take it one step at a time.".into())
        );
    }

    #[test]
    fn test_response_serializes_untagged() {
        let response = SynthesizedResponse {
            message: ReplyMessage::Multiple(vec!["a".into(), "b".into()]),
            emotions: vec![],
            follow_up_questions: vec!["why?".into()],
            conversation_context: None,
            source: ResponseSource::Pattern,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], serde_json::json!(["a", "b"]));
        assert_eq!(json["source"], "pattern");
        assert!(json.get("emotions").is_none());
    }
}

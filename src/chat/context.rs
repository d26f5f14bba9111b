//! Per-(user, persona) conversation context: mood, tone and topic tracking.
//!
//! The synthesizer only passes context through; the transport updates it
//! after every exchange via [`ConversationAnalyzer::update_context`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::persona::PersonaConfig;
use crate::utilities::errors::StoreError;

/// Topics kept in [`ConversationContext::topic_history`].
pub const TOPIC_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Upset,
    Romantic,
    Tired,
}

impl Mood {
    fn sentiment(self) -> Sentiment {
        match self {
            Mood::Happy | Mood::Romantic => Sentiment::Positive,
            Mood::Upset => Sentiment::Negative,
            Mood::Neutral | Mood::Tired => Sentiment::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    #[default]
    Stable,
    Uplifted,
    Distressed,
}

/// Keyword analysis of one user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputAnalysis {
    pub mood: Mood,
    pub sentiment: Sentiment,
    pub topics: Vec<String>,
    pub urgency: Urgency,
}

/// Rolling state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub current_mood: Mood,
    pub conversation_tone: String,
    pub topic_history: Vec<String>,
    pub emotional_state: EmotionalState,
    pub last_user_mood: Mood,
    pub updated_at: DateTime<Utc>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            current_mood: Mood::Neutral,
            conversation_tone: "casual".into(),
            topic_history: Vec::new(),
            emotional_state: EmotionalState::Stable,
            last_user_mood: Mood::Neutral,
            updated_at: Utc::now(),
        }
    }
}

/// Direction of a mood change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodTransition {
    pub previous_mood: Mood,
    pub current_mood: Mood,
    pub kind: TransitionKind,
}

/// A message whose emotion contradicts its content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contradiction {
    pub kind: &'static str,
    pub explanation: &'static str,
}

/// Tone adjustments derived from mood, contradiction and urgency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseModifications {
    pub tone_adjustments: Vec<String>,
    pub additional_prompts: Vec<String>,
    pub response_style: String,
}

/// Storage for conversation contexts.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        persona_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError>;

    async fn put(
        &self,
        user_id: &str,
        persona_id: &str,
        context: ConversationContext,
    ) -> Result<(), StoreError>;
}

/// Process-local context store. Multi-instance deployments need an
/// external implementation of [`ContextStore`].
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    contexts: DashMap<(String, String), ConversationContext>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(
        &self,
        user_id: &str,
        persona_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError> {
        Ok(self
            .contexts
            .get(&(user_id.to_string(), persona_id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn put(
        &self,
        user_id: &str,
        persona_id: &str,
        context: ConversationContext,
    ) -> Result<(), StoreError> {
        self.contexts
            .insert((user_id.to_string(), persona_id.to_string()), context);
        Ok(())
    }
}

const HAPPY_WORDS: &[&str] = &[
    "happy", "excited", "great", "amazing", "awesome", "love", "promotion", "celebration",
];
const UPSET_WORDS: &[&str] = &[
    "sad", "upset", "angry", "stressed", "worried", "anxious", "problem", "bad day",
];
const ROMANTIC_WORDS: &[&str] = &["miss you", "love you", "beautiful", "handsome", "cute", "date"];
const TIRED_WORDS: &[&str] = &["tired", "sleepy", "lazy", "rest", "nap"];
const URGENT_WORDS: &[&str] = &["emergency", "urgent", "help", "crisis", "serious"];

const TOPICS: &[(&str, &[&str])] = &[
    ("work", &["work", "office", "job", "boss", "meeting", "project"]),
    ("family", &["family", "mom", "dad", "mummy", "papa", "parents"]),
    ("health", &["health", "sick", "doctor", "medicine", "gym", "exercise"]),
    ("food", &["food", "eat", "hungry", "dinner", "lunch", "breakfast"]),
];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Keyword-driven mood and topic analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationAnalyzer;

impl ConversationAnalyzer {
    pub fn analyze_input(&self, input: &str) -> InputAnalysis {
        let lower = input.to_lowercase();

        // first matching mood wins
        let (mood, mut urgency) = if contains_any(&lower, HAPPY_WORDS) {
            (Mood::Happy, Urgency::Low)
        } else if contains_any(&lower, UPSET_WORDS) {
            (Mood::Upset, Urgency::Medium)
        } else if contains_any(&lower, ROMANTIC_WORDS) {
            (Mood::Romantic, Urgency::Low)
        } else if contains_any(&lower, TIRED_WORDS) {
            (Mood::Tired, Urgency::Low)
        } else {
            (Mood::Neutral, Urgency::Low)
        };

        if contains_any(&lower, URGENT_WORDS) {
            urgency = Urgency::High;
        }

        let topics = TOPICS
            .iter()
            .filter(|(_, words)| contains_any(&lower, words))
            .map(|(topic, _)| topic.to_string())
            .collect();

        InputAnalysis {
            mood,
            sentiment: mood.sentiment(),
            topics,
            urgency,
        }
    }

    pub fn detect_semantic_contradiction(&self, input: &str) -> Option<Contradiction> {
        let lower = input.to_lowercase();
        if contains_any(&lower, &["sad", "upset"])
            && contains_any(&lower, &["promotion", "won", "success", "passed"])
        {
            return Some(Contradiction {
                kind: "emotional_success",
                explanation: "User expresses sadness about a positive event",
            });
        }
        if contains_any(&lower, &["happy", "excited"])
            && contains_any(&lower, &["failed", "lost", "rejected", "broke up"])
        {
            return Some(Contradiction {
                kind: "emotional_failure",
                explanation: "User expresses happiness about a negative event",
            });
        }
        if contains_any(&lower, &["stressed", "worried"])
            && contains_any(&lower, &["vacation", "holiday", "relaxing"])
        {
            return Some(Contradiction {
                kind: "stress_relaxation",
                explanation: "User expresses stress about relaxing activities",
            });
        }
        None
    }

    /// Compare `current` with the last mood recorded in `context`.
    pub fn detect_mood_transition(
        &self,
        context: Option<&ConversationContext>,
        current: Mood,
    ) -> Option<MoodTransition> {
        let previous = context?.current_mood;
        if previous == current {
            return None;
        }
        let kind = match (previous.sentiment(), current.sentiment()) {
            (Sentiment::Negative, Sentiment::Positive) => TransitionKind::Positive,
            (Sentiment::Positive, Sentiment::Negative) => TransitionKind::Negative,
            _ => TransitionKind::Neutral,
        };
        Some(MoodTransition {
            previous_mood: previous,
            current_mood: current,
            kind,
        })
    }

    pub fn response_modifications(
        &self,
        context: Option<&ConversationContext>,
        input: &str,
    ) -> ResponseModifications {
        let analysis = self.analyze_input(input);
        let mut tone_adjustments = Vec::new();
        let mut additional_prompts = Vec::new();
        let mut response_style = "normal";

        match self.detect_mood_transition(context, analysis.mood).map(|t| t.kind) {
            Some(TransitionKind::Negative) => {
                tone_adjustments.push("Show empathy and concern".to_string());
                additional_prompts.push("Acknowledge the mood change".to_string());
            }
            Some(TransitionKind::Positive) => {
                tone_adjustments.push("Show relief and happiness".to_string());
                additional_prompts.push("Celebrate the positive change".to_string());
            }
            _ => {}
        }

        if self.detect_semantic_contradiction(input).is_some() {
            tone_adjustments.push("Express confusion and ask for clarification".to_string());
            additional_prompts.push("Question the contradiction gently".to_string());
            response_style = "questioning";
        }

        if analysis.urgency == Urgency::High {
            tone_adjustments.push("Respond with immediate concern and attention".to_string());
            response_style = "urgent";
        }

        ResponseModifications {
            tone_adjustments,
            additional_prompts,
            response_style: response_style.to_string(),
        }
    }

    fn conversation_tone(&self, persona: &PersonaConfig, mood: Mood) -> String {
        if !persona.capabilities.mood_adaptive_tone {
            return persona.style.tone.clone();
        }
        match mood {
            Mood::Romantic => "flirty".into(),
            Mood::Upset => "caring".into(),
            Mood::Happy => "playful".into(),
            Mood::Tired => "gentle".into(),
            Mood::Neutral => persona.style.tone.clone(),
        }
    }

    /// Fold one exchange into the stored context and return the new state.
    pub async fn update_context(
        &self,
        store: &dyn ContextStore,
        user_id: &str,
        persona: &PersonaConfig,
        user_input: &str,
        reply: &str,
    ) -> Result<ConversationContext, StoreError> {
        let analysis = self.analyze_input(user_input);
        let mut context = store.get(user_id, &persona.id).await?.unwrap_or_default();

        context.last_user_mood = context.current_mood;
        context.current_mood = analysis.mood;
        context.emotional_state = match analysis.sentiment {
            Sentiment::Positive => EmotionalState::Uplifted,
            Sentiment::Negative => EmotionalState::Distressed,
            Sentiment::Neutral => context.emotional_state,
        };
        context.topic_history.extend(analysis.topics);
        if context.topic_history.len() > TOPIC_HISTORY_LIMIT {
            let excess = context.topic_history.len() - TOPIC_HISTORY_LIMIT;
            context.topic_history.drain(..excess);
        }
        context.conversation_tone = self.conversation_tone(persona, analysis.mood);
        context.updated_at = Utc::now();

        log::debug!(
            "Context updated for {}/{}: mood={:?} tone={} reply_chars={}",
            user_id,
            persona.id,
            context.current_mood,
            context.conversation_tone,
            reply.chars().count()
        );

        store.put(user_id, &persona.id, context.clone()).await?;
        Ok(context)
    }
}

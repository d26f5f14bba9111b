//! Chat-completion call-out.
//!
//! The synthesis pipeline talks to a model only through [`ChatCompletion`].
//! [`OpenAICompletion`] implements it over any OpenAI-compatible
//! `/chat/completions` endpoint.

pub mod summarizer;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{Speaker, Turn};
use crate::utilities::config::LlmConfig;
use crate::utilities::errors::LlmError;

pub use summarizer::{LlmSummarizer, Summarizer};

/// One message in the provider's chat format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        match turn.speaker {
            Speaker::User => ChatMessage::user(turn.text.clone()),
            Speaker::Persona => ChatMessage::assistant(turn.text.clone()),
        }
    }
}

/// A chat-completion capable model.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Complete `user_message` under `system_prompt`, optionally after prior turns.
    async fn complete(
        &self,
        user_message: &str,
        system_prompt: &str,
        model: Option<&str>,
        history: &[Turn],
    ) -> Result<String, LlmError>;
}

/// Build the message list: system prompt (if any), prior turns, then the new message.
pub fn build_messages(user_message: &str, system_prompt: &str, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(user_message));
    messages
}

/// Extract `choices[0].message.content` from a completion response.
pub fn parse_completion(response: &Value) -> Result<String, LlmError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| LlmError::Malformed("no content in completion response".into()))
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAICompletion {
    client: reqwest::Client,
    config: LlmConfig,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAICompletion {
    /// Default per-request transport timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            config,
            temperature: 0.8,
            max_tokens: 500,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, model: &str, messages: &[ChatMessage]) -> Value {
        serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenAICompletion {
    async fn complete(
        &self,
        user_message: &str,
        system_prompt: &str,
        model: Option<&str>,
        history: &[Turn],
    ) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;
        let model = model.unwrap_or(&self.config.model);
        let messages = build_messages(user_message, system_prompt, history);
        let body = self.build_request_body(model, &messages);
        let endpoint = self.endpoint();

        log::debug!(
            "OpenAICompletion.complete: model={}, messages={}",
            model,
            messages.len()
        );

        // Retry loop with exponential backoff
        let mut last_error: Option<LlmError> = None;
        let mut retry_delay = Duration::from_secs(1);
        let mut rate_limited = 0u32;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                log::warn!(
                    "Chat completion retry attempt {} after {:?}",
                    attempt,
                    retry_delay
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = match self
                .client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                last_error = Some(LlmError::RateLimited(rate_limited));
                continue;
            }

            if status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                last_error = Some(LlmError::Status {
                    status: status.as_u16(),
                    body: text,
                });
                continue;
            }

            let response_text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            if status.is_client_error() {
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body: response_text,
                });
            }

            let json: Value = serde_json::from_str(&response_text).map_err(|e| {
                LlmError::Malformed(format!(
                    "{} - Body: {}",
                    e,
                    crate::utilities::string_utils::preview(&response_text, 500)
                ))
            })?;
            return parse_completion(&json);
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::Malformed("chat completion failed after all retries".into())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_order() {
        let history = vec![Turn::user("hi"), Turn::persona("hello!")];
        let messages = build_messages("how are you", "be nice", &history);
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "how are you");

        let bare = build_messages("summarize", "", &[]);
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].role, "user");
    }

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Heyy!  "}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Heyy!");
        assert!(matches!(
            parse_completion(&serde_json::json!({"choices": []})),
            Err(LlmError::Malformed(_))
        ));
    }

    #[test]
    fn test_request_body_structure() {
        let client = OpenAICompletion::new(LlmConfig::default())
            .unwrap()
            .with_temperature(0.3);
        let body = client.build_request_body("gpt-4o-mini", &[ChatMessage::user("x")]);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let client = OpenAICompletion::new(LlmConfig::default()).unwrap();
        let err = client.complete("hi", "sys", None, &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}

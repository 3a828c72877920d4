//! Chat completion client for the model endpoint
//!
//! One trait, `ChatClient`, backs every oracle call in the pipeline: the
//! assistant's own completions, policy evaluation, and redaction rewrites.
//! The production implementation speaks the OpenAI-compatible
//! `/v1/chat/completions` wire format.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::oracle::retry::{with_retry, AttemptOutcome, RetryConfig};

/// A string wrapper that redacts its value in Debug and Display output.
/// Prevents API keys from leaking into logs and error messages.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value (use sparingly, only for HTTP headers)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role of one chat message on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a chat completion request
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion client trait
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Complete a conversation and return the assistant's text reply.
    ///
    /// `system` is prepended as the system message when present.
    async fn complete(&self, system: Option<&str>, messages: &[ChatMessage]) -> Result<String>;
}

/// Normalize base URL by stripping trailing slashes and `/v1`
fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .trim_end_matches("/v1")
        .trim_end_matches('/')
        .to_string()
}

/// OpenAI-compatible chat completions client
pub struct OpenAiChatClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: f32,
    timeout: std::time::Duration,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl OpenAiChatClient {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.0,
            timeout: std::time::Duration::from_secs(30),
            client: reqwest::Client::new(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn build_request(&self, system: Option<&str>, messages: &[ChatMessage]) -> serde_json::Value {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system {
            wire_messages.push(serde_json::json!({
                "role": "system",
                "content": sys,
            }));
        }

        for msg in messages {
            wire_messages.push(serde_json::json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            }));
        }

        serde_json::json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": self.temperature,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, system: Option<&str>, messages: &[ChatMessage]) -> Result<String> {
        let request_body = self.build_request(system, messages);
        let url = format!("{}/v1/chat/completions", self.base_url);

        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let body = with_retry(&self.retry_config, |_attempt| {
            let client = &self.client;
            let url = &url;
            let api_key = &self.api_key;
            let request_body = &request_body;
            async move {
                let response = match client
                    .post(url.as_str())
                    .header("Authorization", format!("Bearer {}", api_key.expose()))
                    .timeout(self.timeout)
                    .json(request_body)
                    .send()
                    .await
                {
                    Ok(resp) => resp,
                    Err(e) => {
                        return AttemptOutcome::Fatal(Error::Transport(format!(
                            "failed to reach {}: {}",
                            url, e
                        )))
                    }
                };

                let status = response.status();
                let retry_after = RetryConfig::parse_retry_after(
                    response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok()),
                );
                let body = response.text().await.unwrap_or_default();

                if status.is_success() {
                    AttemptOutcome::Success(body)
                } else if self.retry_config.is_retryable_status(status) {
                    AttemptOutcome::Retryable {
                        status,
                        body,
                        retry_after,
                    }
                } else {
                    AttemptOutcome::Fatal(Error::Transport(format!(
                        "model endpoint error at {} ({}): {}",
                        url, status, body
                    )))
                }
            }
        })
        .await?;

        let response: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Transport(format!("invalid completion response body: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Transport("completion response contained no choices".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

// OpenAI-compatible response types
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_string_redacts_debug_and_display() {
        let secret = SecretString::new("sk-super-secret");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "sk-super-secret");
    }

    #[test]
    fn normalize_base_url_strips_v1() {
        assert_eq!(
            normalize_base_url("https://api.example.com"),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_base_url("https://api.example.com/v1/"),
            "https://api.example.com"
        );
    }

    #[test]
    fn request_carries_system_and_history() {
        let client = OpenAiChatClient::new(SecretString::new("k"), "test-model");
        let messages = vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi there"),
        ];
        let body = client.build_request(Some("be helpful"), &messages);

        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[0]["content"], "be helpful");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn request_without_system_message() {
        let client = OpenAiChatClient::new(SecretString::new("k"), "test-model");
        let body = client.build_request(None, &[ChatMessage::user("hi")]);
        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }

    #[test]
    fn completion_response_parses() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hello")
        );
    }
}

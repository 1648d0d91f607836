//! Completion Client
//!
//! Information Hiding:
//! - HTTP wire format hidden behind the `CompletionClient` trait
//! - Retry and transport policy owned by the client, never by the stores
//! - Endpoint configurable so tests can point at a mock server

use crate::config::Settings;
use crate::core::types::{Message, Role};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One (role, content) pair as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl From<&Message> for Turn {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// A fully parameterized completion request: system turn first, then the
/// conversation history in original insertion order.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn from_history(settings: &Settings, history: &[Message]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Turn {
            role: Role::System.as_str().to_string(),
            content: settings.system_prompt.clone(),
        });
        messages.extend(history.iter().map(Turn::from));

        Self {
            model: settings.model.as_str().to_string(),
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// The remote collaborator that turns a message history plus parameters
/// into a generated reply. Network, auth and quota failures all surface as
/// a single error to callers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Turn>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

impl ChatRequest {
    fn from_request(request: CompletionRequest, stream: bool) -> Self {
        Self {
            model: request.model,
            messages: request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Turn,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Point the client at a different endpoint (mock server, gateway).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Construct from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = Settings::api_key()?;
        match std::env::var("OPENAI_BASE_URL") {
            Ok(base) => Ok(Self::with_base_url(api_key, base)),
            Err(_) => Ok(Self::new(api_key)),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Streaming completion: token deltas are forwarded over `tx` as they
    /// arrive and the endpoint's SSE framing stays internal.
    pub async fn stream(&self, request: CompletionRequest, tx: mpsc::Sender<String>) -> Result<()> {
        let body = ChatRequest::from_request(request, true);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("API error {}: {}", status, error_text);
        }

        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            if let Ok(bytes) = chunk {
                let text = String::from_utf8_lossy(&bytes);

                for line in text.lines() {
                    if let Some(json_str) = line.strip_prefix("data: ") {
                        if json_str == "[DONE]" {
                            return Ok(());
                        }

                        if let Ok(chunk) = serde_json::from_str::<StreamChunk>(json_str) {
                            if let Some(content) =
                                chunk.choices.first().and_then(|c| c.delta.content.as_ref())
                            {
                                tx.send(content.clone()).await?;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ChatRequest::from_request(request, false);

        const MAX_RETRIES: u32 = 3;
        const BASE_DELAY_MS: u64 = 1000;

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "[OpenAiClient] Retrying completion (attempt {}/{}) after {}ms delay",
                    attempt + 1,
                    MAX_RETRIES,
                    delay
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            }

            let response_result = self
                .client
                .post(self.endpoint())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            let response = match response_result {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("[OpenAiClient] HTTP request failed: {}", e);
                    last_error = Some(anyhow::anyhow!("HTTP request failed: {}", e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::warn!(
                    "[OpenAiClient] API returned error status {}: {}",
                    status,
                    error_text
                );
                last_error = Some(anyhow::anyhow!("API error {}: {}", status, error_text));
                continue;
            }

            let chat_response = match response.json::<ChatResponse>().await {
                Ok(cr) => cr,
                Err(e) => {
                    tracing::warn!("[OpenAiClient] Failed to decode response body: {}", e);
                    last_error = Some(anyhow::anyhow!("Response decode error: {}", e));
                    continue;
                }
            };

            return Ok(chat_response
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .unwrap_or_default());
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("All retry attempts failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Message;

    #[test]
    fn test_request_leads_with_system_turn() {
        let settings = Settings::default();
        let history = vec![Message::user("שלום"), Message::assistant("שלום לך")];

        let request = CompletionRequest::from_history(&settings, &history);

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[0].content, settings.system_prompt);
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[1].content, "שלום");
        assert_eq!(request.messages[2].role, "assistant");
    }

    #[test]
    fn test_request_carries_settings_parameters() {
        let settings = Settings {
            temperature: 0.3,
            max_tokens: 512,
            ..Settings::default()
        };

        let request = CompletionRequest::from_history(&settings, &[]);

        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.model, settings.model.as_str());
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = OpenAiClient::with_base_url("key".into(), "http://localhost:9999/".into());
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1/chat/completions"
        );
    }
}

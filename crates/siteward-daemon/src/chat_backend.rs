//! Minimal OpenAI-compatible chat completion backend, wiring
//! `siteward_core::ChatBackend` to a real HTTP collaborator.
//!
//! Built on a `reqwest::Client` constructed once in `new()` plus a
//! JSON POST in an `async fn`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use siteward_core::ChatBackend;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiChatBackend {
    /// Build a backend targeting the default OpenAI API.
    #[must_use]
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f64) -> Self {
        Self::with_base_url(
            "https://api.openai.com/v1".to_string(),
            api_key,
            model,
            max_tokens,
            temperature,
        )
    }

    /// Build a backend targeting an explicit base URL (for self-hosted
    /// or compatible gateways).
    #[must_use]
    pub fn with_base_url(base_url: String, api_key: String, model: String, max_tokens: u32, temperature: f64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    async fn complete(&self, prompt: &str) -> siteward_core::Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| siteward_core::Error::Collaborator(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(siteward_core::Error::Collaborator(format!(
                "chat completion API returned {status}: {body}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| siteward_core::Error::Collaborator(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| siteward_core::Error::Collaborator("empty choices array".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

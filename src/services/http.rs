//! Text generation over an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::TextGenerator;
use crate::config::GenerationConfig;
use crate::error::{Result, StencilError};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`TextGenerator`] backed by reqwest.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpTextGenerator {
    /// Build from config. The API key is read from `config.api_key_env`;
    /// a missing key is allowed for endpoints that need none.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("stencil/0.1")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StencilError::Generation(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "requesting completion");
        let response = request
            .send()
            .await
            .map_err(|e| StencilError::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StencilError::Generation(format!(
                "HTTP {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| StencilError::Generation(format!("invalid response body: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(StencilError::Generation("empty completion".into()));
        }
        Ok(text)
    }
}

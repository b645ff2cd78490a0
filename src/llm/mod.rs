//! Text-generation collaborator: send a prompt, get text back.
//!
//! Everything else about the provider's API is out of scope; the rest of
//! the crate only sees the `TextGenerator` trait.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 700;
const TEMPERATURE: f64 = 0.7;
const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes web pages for a tech-savvy reader.";

static LLM_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .expect("Failed to build LLM client")
});

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation api error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("generation response had no content")]
    EmptyResponse,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// OpenAI-compatible chat-completions implementation.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: COMPLETIONS_URL.to_string(),
        }
    }

    /// Point at a compatible non-default endpoint (also used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let response = LLM_CLIENT
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt }
                ],
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api { status, body });
        }

        let body: serde_json::Value = response.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        Ok(content)
    }
}

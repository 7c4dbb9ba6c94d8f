//! Generation collaborator interface and implementations.
//!
//! The query path consumes answer generation as a black box behind
//! [`GenerationProvider`]: prompt in, answer text out. A failure here is
//! surfaced with the composed prompt and provenance still in hand, so the
//! caller can retry generation without re-running retrieval.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::errors::GenerationError;
use crate::retry::RetryPolicy;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Produce an answer for a fully composed prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

pub fn create_provider(
    config: &GenerationConfig,
    retry: RetryPolicy,
) -> Result<Arc<dyn GenerationProvider>, GenerationError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGeneration)),
        "openai" => Ok(Arc::new(OpenAiGeneration::new(config, retry)?)),
        other => Err(GenerationError::Config(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

pub struct DisabledGeneration;

#[async_trait]
impl GenerationProvider for DisabledGeneration {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

/// Generation provider backed by `POST /v1/chat/completions`.
///
/// Same retry shape as the embedding provider: 429/5xx and network
/// errors retry under the policy, other 4xx fail immediately.
pub struct OpenAiGeneration {
    model: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiGeneration {
    pub fn new(config: &GenerationConfig, retry: RetryPolicy) -> Result<Self, GenerationError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| GenerationError::Config("generation.model required".to_string()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GenerationError::Config("OPENAI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Config(e.to_string()))?;

        Ok(Self {
            model,
            api_key,
            client,
            retry,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGeneration {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let mut last_err = None;

        for attempt in 0..self.retry.max_attempts {
            tokio::time::sleep(self.retry.delay(attempt)).await;

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| GenerationError::Service(e.to_string()))?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(GenerationError::Service(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(GenerationError::Service(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(GenerationError::Service(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| GenerationError::Service("generation failed after retries".into())))
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GenerationError::Service("invalid response: missing choices".into()))
}

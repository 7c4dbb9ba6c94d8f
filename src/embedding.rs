//! Embedding collaborator interface and implementations.
//!
//! The pipeline consumes embeddings as a black box behind
//! [`EmbeddingProvider`]: text in, fixed-dimension vector out. Concrete
//! implementations:
//!
//! - **[`DisabledEmbeddings`]** — always errors; the default when no
//!   provider is configured.
//! - **[`OpenAiEmbeddings`]** — calls the OpenAI embeddings API with
//!   batching, a bounded [`RetryPolicy`], and a per-request timeout.
//!
//! Also home to the vector utilities shared by the index and retriever:
//! [`cosine_similarity`], plus [`vec_to_blob`]/[`blob_to_vec`] for
//! encoding vectors as little-endian `f32` BLOBs in SQLite.
//!
//! # Retry strategy
//!
//! HTTP 429 and 5xx responses and network errors are retried with
//! exponential backoff under the policy; other 4xx responses fail
//! immediately. Exhausting the policy surfaces
//! [`EmbeddingError::Service`] for the affected document only.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::errors::EmbeddingError;
use crate::retry::RetryPolicy;

/// The embedding collaborator: text → fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded alongside every index entry.
    fn model_name(&self) -> &str;

    /// Vector dimensionality; every vector in one index shares it.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Service("empty embedding response".to_string()))
    }
}

/// Instantiate the provider named by the configuration.
pub fn create_provider(
    config: &EmbeddingConfig,
    retry: RetryPolicy,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbeddings)),
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config, retry)?)),
        other => Err(EmbeddingError::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Disabled provider ============

/// No-op provider used when `embedding.provider = "disabled"`.
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ OpenAI provider ============

/// Embedding provider backed by `POST /v1/embeddings`.
///
/// Requires `OPENAI_API_KEY` in the environment. Batches are sized by the
/// caller; each call carries the configured timeout and retry policy.
pub struct OpenAiEmbeddings {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Self, EmbeddingError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| EmbeddingError::Config("embedding.model required".to_string()))?;
        let dims = config
            .dims
            .ok_or_else(|| EmbeddingError::Config("embedding.dims required".to_string()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EmbeddingError::Config("OPENAI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self {
            model,
            dims,
            api_key,
            client,
            retry,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..self.retry.max_attempts {
            tokio::time::sleep(self.retry.delay(attempt)).await;

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
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
                            .map_err(|e| EmbeddingError::Service(e.to_string()))?;
                        let vectors = parse_embeddings_response(&json)?;
                        return self.check_dims(vectors, texts.len());
                    }

                    // Rate limited or server error: retry under the policy.
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(EmbeddingError::Service(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Other client errors are not retryable.
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(EmbeddingError::Service(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(EmbeddingError::Service(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbeddingError::Service("embedding failed after retries".into())))
    }
}

impl OpenAiEmbeddings {
    fn check_dims(
        &self,
        vectors: Vec<Vec<f32>>,
        expected_count: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if vectors.len() != expected_count {
            return Err(EmbeddingError::Service(format!(
                "expected {} embeddings, got {}",
                expected_count,
                vectors.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.dims {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dims,
                    got: vector.len(),
                });
            }
        }
        Ok(vectors)
    }
}

fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbeddingError::Service("invalid response: missing data array".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbeddingError::Service("invalid response: missing embedding".into()))?;
        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vector);
    }
    Ok(embeddings)
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

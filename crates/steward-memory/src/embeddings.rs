use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use steward_core::config::EmbeddingsConfig;
use tracing::{debug, warn};

use crate::error::{MemoryError, Result};

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible `/v1/embeddings` client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(cfg: &EmbeddingsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            dimensions: cfg.dimensions,
        }
    }

    async fn request(&self, input: Value) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MemoryError::NotConfigured("embeddings.api_key is not set".into()))?;
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "input": input,
            "model": self.model,
            "dimensions": self.dimensions,
        });

        debug!(model = %self.model, "requesting embeddings");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "embeddings API error");
            let message = serde_json::from_str::<ApiError>(&text)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(MemoryError::Embedding(format!("OpenAI API error: {message}")));
        }

        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| MemoryError::Embedding(format!("malformed embeddings response: {e}")))?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(json!(text))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("embeddings response was empty".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.request(json!(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(MemoryError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

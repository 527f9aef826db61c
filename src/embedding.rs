//! Embedding provider interface.
//!
//! Embedding models are opaque external services; the core only sees
//! fixed-dimension vectors. Returned vector lengths are validated against
//! the configured dimensions by the ingestion pipeline, never trusted.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::RagConfig;
use crate::core::errors::ApiError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn text_model_id(&self) -> &str;
    fn text_dim(&self) -> usize;
    fn image_model_id(&self) -> &str;
    fn image_dim(&self) -> usize;

    /// Embed a text passage or query.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ApiError>;

    /// Embed an image from its base64 payload.
    async fn embed_image(&self, image_base64: &str) -> Result<Vec<f32>, ApiError>;
}

/// HTTP embedding provider speaking the OpenAI-compatible `/v1/embeddings`
/// shape served by local inference runtimes.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    text_model: String,
    text_dim: usize,
    image_model: String,
    image_dim: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &RagConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.embedding_base_url.trim_end_matches('/').to_string(),
            text_model: config.text_embedding_model.clone(),
            text_dim: config.text_embedding_dim,
            image_model: config.image_embedding_model.clone(),
            image_dim: config.image_embedding_dim,
        }
    }

    async fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": model,
            "input": [input],
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("embedding server error: {text}")));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        let embedding = payload["data"][0]["embedding"]
            .as_array()
            .map(|vals| {
                vals.iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Vec<f32>>()
            })
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ApiError::Internal("embedding server returned no embedding".to_string())
            })?;

        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn text_model_id(&self) -> &str {
        &self.text_model
    }

    fn text_dim(&self) -> usize {
        self.text_dim
    }

    fn image_model_id(&self) -> &str {
        &self.image_model
    }

    fn image_dim(&self) -> usize {
        self.image_dim
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        self.embed(&self.text_model, text).await
    }

    async fn embed_image(&self, image_base64: &str) -> Result<Vec<f32>, ApiError> {
        self.embed(&self.image_model, image_base64).await
    }
}

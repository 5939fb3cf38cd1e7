//! Embedding Client
//!
//! Client-side embeddings for the document index, served by Ollama's
//! embeddings endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::types::{LoreError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";

pub type SharedEmbedder = Arc<dyn Embedder>;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding model name for logging
    fn model(&self) -> &str;
}

/// Embeddings via Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(api_base: Option<String>, model: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LoreError::Index(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.api_base);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LoreError::Index(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoreError::Index(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to parse embedding response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(LoreError::Index("Empty embedding returned".to_string()));
        }

        Ok(body.embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

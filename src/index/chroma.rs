//! Chroma Document Index
//!
//! HTTP client for a Chroma-compatible vector store. Collections are created
//! lazily with cosine distance; relevance scores are `1 - distance`, with the
//! caller's minimum-score threshold applied client-side.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use super::{DocumentIndex, IndexDocument, Metadata, ScoredDocument, SearchRequest, SharedEmbedder};
use crate::types::{LoreError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:8000";

pub struct ChromaIndex {
    api_base: String,
    client: reqwest::Client,
    embedder: SharedEmbedder,
    /// Collection name -> server-side collection id
    collection_ids: Mutex<HashMap<String, String>>,
}

impl ChromaIndex {
    pub fn new(api_base: Option<String>, timeout_secs: u64, embedder: SharedEmbedder) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LoreError::Index(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            client,
            embedder,
            collection_ids: Mutex::new(HashMap::new()),
        })
    }

    /// Get-or-create the collection and return its server-side id.
    async fn ensure_collection(&self, name: &str) -> Result<String> {
        {
            let ids = self.collection_ids.lock().await;
            if let Some(id) = ids.get(name) {
                return Ok(id.clone());
            }
        }

        let url = format!("{}/api/v1/collections", self.api_base);
        let body = json!({
            "name": name,
            "metadata": { "hnsw:space": "cosine" },
            "get_or_create": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LoreError::Index(format!("Collection request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LoreError::Index(format!(
                "Collection '{}' error ({}): {}",
                name, status, text
            )));
        }

        let collection: CollectionResponse = response
            .json()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to parse collection response: {}", e)))?;

        let mut ids = self.collection_ids.lock().await;
        ids.insert(name.to_string(), collection.id.clone());
        Ok(collection.id)
    }

    async fn post_json(&self, url: &str, body: &Value, what: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| LoreError::Index(format!("{} request failed: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LoreError::Index(format!(
                "{} error ({}): {}",
                what, status, text
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl DocumentIndex for ChromaIndex {
    async fn upsert(&self, collection: &str, doc: IndexDocument) -> Result<()> {
        let collection_id = self.ensure_collection(collection).await?;
        let embedding = self.embedder.embed(&doc.text).await?;

        let url = format!(
            "{}/api/v1/collections/{}/upsert",
            self.api_base, collection_id
        );
        let body = json!({
            "ids": [doc.id],
            "embeddings": [embedding],
            "documents": [doc.text],
            "metadatas": [doc.metadata],
        });

        self.post_json(&url, &body, "Upsert").await?;
        debug!(collection, "upserted document");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        request: &SearchRequest,
    ) -> Result<Vec<ScoredDocument>> {
        let collection_id = self.ensure_collection(collection).await?;
        let embedding = self.embedder.embed(&request.query).await?;

        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.api_base, collection_id
        );
        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": request.limit,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(kind) = request.kind {
            body["where"] = json!({ "kind": { "$eq": kind.as_str() } });
        }

        let response = self.post_json(&url, &body, "Query").await?;
        let results: QueryResponse = response
            .json()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to parse query response: {}", e)))?;

        // Chroma nests one result list per query embedding; we always send one
        let ids = results.ids.into_iter().next().unwrap_or_default();
        let documents = results.documents.into_iter().next().unwrap_or_default();
        let metadatas = results.metadatas.into_iter().next().unwrap_or_default();
        let distances = results.distances.into_iter().next().unwrap_or_default();

        let mut scored = Vec::new();
        for (i, id) in ids.into_iter().enumerate() {
            let distance = distances.get(i).copied().unwrap_or(1.0);
            let score = 1.0 - distance;
            if score < request.min_score {
                continue;
            }
            scored.push(ScoredDocument {
                id,
                text: documents.get(i).cloned().flatten().unwrap_or_default(),
                score,
                metadata: metadatas.get(i).cloned().flatten(),
            });
        }

        Ok(scored)
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        let url = format!("{}/api/v1/collections/{}", self.api_base, collection);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| LoreError::Index(format!("Delete request failed: {}", e)))?;

        // Deleting a collection that never existed is not an error
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LoreError::Index(format!(
                "Delete collection '{}' error ({}): {}",
                collection, status, text
            )));
        }

        self.collection_ids.lock().await.remove(collection);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<Metadata>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

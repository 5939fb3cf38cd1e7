//! Document Index
//!
//! Similarity-search and upsert interface over an external vector store.
//! The store itself is a black box behind the `DocumentIndex` trait; the
//! shipped implementation talks to a Chroma-compatible HTTP server with
//! embeddings computed client-side through an `Embedder`.
//!
//! Index clients are constructed per run and injected into the driver,
//! never held as process-wide state.

mod chroma;
mod embedder;

pub use chroma::ChromaIndex;
pub use embedder::{Embedder, OllamaEmbedder, SharedEmbedder};

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{Result, SummaryKind};

/// Collection holding per-commit summary documents.
pub const COMMITS_COLLECTION: &str = "commits";

/// Collection holding project documentation files.
pub const GENERAL_DOCS_COLLECTION: &str = "general_docs";

/// Flat metadata map attached to an indexed document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document to upsert, keyed by a stable id.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A similarity query.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum number of results
    pub limit: usize,
    /// Minimum relevance score in `[0, 1]`; lower-scoring hits are dropped
    pub min_score: f32,
    /// Restrict results to documents of one summary kind
    pub kind: Option<SummaryKind>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: crate::constants::retrieval::DEFAULT_LIMIT,
            min_score: crate::constants::retrieval::DEFAULT_MIN_SCORE,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: SummaryKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// One search hit: the document plus its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Option<Metadata>,
}

/// Shared index handle injected into the driver for the duration of a run.
pub type SharedIndex = Arc<dyn DocumentIndex>;

/// Upsert/search/clear interface over an external document store.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Insert or fully replace a document in `collection`.
    async fn upsert(&self, collection: &str, doc: IndexDocument) -> Result<()>;

    /// Ranked similarity search over `collection`.
    async fn search(
        &self,
        collection: &str,
        request: &SearchRequest,
    ) -> Result<Vec<ScoredDocument>>;

    /// Remove every document in `collection`.
    async fn clear(&self, collection: &str) -> Result<()>;
}

/// Metadata block for a commit-summary document.
pub fn summary_metadata(
    record: &crate::types::CommitRecord,
    index: u32,
    kind: SummaryKind,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("commit_hash".into(), record.hash.clone().into());
    metadata.insert("index".into(), index.into());
    metadata.insert("author".into(), record.author.clone().into());
    metadata.insert(
        "date".into(),
        record
            .timestamp
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .into(),
    );
    metadata.insert("message".into(), record.message.clone().into());
    metadata.insert("kind".into(), kind.as_str().into());
    metadata
}

/// Metadata block for a project documentation file.
pub fn doc_file_metadata(relative_path: &str, insert_date: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("filename".into(), relative_path.into());
    metadata.insert("insert_date".into(), insert_date.into());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommitRecord;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    #[test]
    fn test_summary_metadata_fields() {
        let record = CommitRecord {
            hash: "abcd".to_string(),
            author: "A <a@example.com>".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: "Fix gc.".to_string(),
            files_changed: vec![],
            diffs: BTreeMap::new(),
            category: None,
            general_summary: None,
            technical_summary: None,
        };

        let metadata = summary_metadata(&record, 7, SummaryKind::Technical);
        assert_eq!(metadata["commit_hash"], "abcd");
        assert_eq!(metadata["index"], 7);
        assert_eq!(metadata["kind"], "technical");
        assert!(metadata["date"].as_str().unwrap().starts_with("2023-11-"));
    }

    #[test]
    fn test_search_request_defaults() {
        let request = SearchRequest::new("query").with_kind(SummaryKind::General);
        assert_eq!(request.limit, 3);
        assert!(request.min_score > 0.0);
        assert_eq!(request.kind, Some(SummaryKind::General));
    }
}

//! Index-Docs Command
//!
//! Scans the mined repository for documentation files and upserts them into
//! the general-docs collection. Upserts run with bounded concurrency; one
//! failed file is reported and skipped, not fatal.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::extract::DocScanner;
use crate::index::{
    ChromaIndex, GENERAL_DOCS_COLLECTION, IndexDocument, OllamaEmbedder, SharedEmbedder,
    SharedIndex, doc_file_metadata,
};
use crate::types::{LoreError, Result};

/// Number of documents embedded and upserted concurrently.
const UPSERT_CONCURRENCY: usize = 4;

pub async fn run(path: Option<PathBuf>) -> Result<()> {
    let output = Output::new();

    if !ConfigLoader::is_project_initialized() {
        return Err(LoreError::NotInitialized);
    }
    let config = ConfigLoader::load()?;
    let root = path.unwrap_or_else(|| config.repository.path.clone());

    output.section("Scanning documentation");
    let docs = DocScanner::new(&root).scan()?;
    if docs.is_empty() {
        output.info("No documentation files found");
        return Ok(());
    }
    output.info(&format!("Found {} documentation files", docs.len()));

    let embedder: SharedEmbedder = Arc::new(OllamaEmbedder::new(
        config.embedding.api_base.clone(),
        config.embedding.model.clone(),
        config.llm.timeout_secs,
    )?);
    let index: SharedIndex = Arc::new(ChromaIndex::new(
        config.index.api_base.clone(),
        config.index.timeout_secs,
        embedder,
    )?);

    let insert_date = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let results = stream::iter(docs.into_iter().map(|doc| {
        let index = index.clone();
        let insert_date = insert_date.clone();
        async move {
            let name = doc.relative_path.clone();
            let result = index
                .upsert(
                    GENERAL_DOCS_COLLECTION,
                    IndexDocument {
                        id: doc.id,
                        text: doc.content,
                        metadata: doc_file_metadata(&doc.relative_path, &insert_date),
                    },
                )
                .await;
            (name, result)
        }
    }))
    .buffer_unordered(UPSERT_CONCURRENCY)
    .collect::<Vec<_>>()
    .await;

    let mut indexed = 0usize;
    let mut failed = 0usize;
    for (name, result) in results {
        match result {
            Ok(()) => indexed += 1,
            Err(e) => {
                failed += 1;
                warn!("Failed to index '{}': {}", name, e);
            }
        }
    }

    output.success(&format!("Indexed {} documentation files", indexed));
    if failed > 0 {
        output.warning(&format!("{} files failed; rerun to retry", failed));
    }

    Ok(())
}

//! Clean Command
//!
//! Resets experiment state: summary rows, index collections, and checkpoint
//! files. The raw checkpoint survives unless --all is given.

use std::sync::Arc;

use crate::checkpoint::{CheckpointStore, RAW_CHECKPOINT};
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::index::{
    COMMITS_COLLECTION, ChromaIndex, GENERAL_DOCS_COLLECTION, OllamaEmbedder, SharedEmbedder,
    SharedIndex,
};
use crate::storage::Database;
use crate::types::{LoreError, Result};

pub async fn run(all: bool, summaries: bool, documents: bool, checkpoints: bool) -> Result<()> {
    let output = Output::new();

    if !ConfigLoader::is_project_initialized() {
        return Err(LoreError::NotInitialized);
    }
    let config = ConfigLoader::load()?;

    let everything = all || (!summaries && !documents && !checkpoints);

    if everything || summaries {
        if config.database.path.exists() {
            let db = Database::open(&config.database.path)?;
            db.delete_all_summaries()?;
            output.success("Deleted summary rows");
        } else {
            output.info("No database yet, nothing to delete");
        }
    }

    if everything || documents {
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
        index.clear(COMMITS_COLLECTION).await?;
        index.clear(GENERAL_DOCS_COLLECTION).await?;
        output.success("Cleared index collections");
    }

    if everything || checkpoints {
        let store = CheckpointStore::new(&config.checkpoint.dir);
        let experiment_path = store.path_for(&config.checkpoint.experiment);
        if experiment_path.exists() {
            std::fs::remove_file(&experiment_path)?;
            output.success(&format!(
                "Removed checkpoint for experiment '{}'",
                config.checkpoint.experiment
            ));
        }

        // The raw checkpoint is expensive to rebuild; only --all touches it
        if all {
            let raw_path = store.path_for(RAW_CHECKPOINT);
            if raw_path.exists() {
                std::fs::remove_file(&raw_path)?;
                output.success("Removed raw checkpoint");
            }
        }
    }

    Ok(())
}

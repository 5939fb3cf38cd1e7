//! Status Command
//!
//! Shows checkpoint progress: how many records exist, how far enrichment
//! has advanced per field, and the category distribution so far.

use crate::checkpoint::{CheckpointStore, RAW_CHECKPOINT};
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::{LoreError, Result};

pub fn run() -> Result<()> {
    let output = Output::new();

    if !ConfigLoader::is_project_initialized() {
        return Err(LoreError::NotInitialized);
    }
    let config = ConfigLoader::load()?;
    let store = CheckpointStore::new(&config.checkpoint.dir);
    let experiment = &config.checkpoint.experiment;

    output.section("Checkpoints");
    match store.load(RAW_CHECKPOINT)? {
        Some(raw) => output.stat("Raw commits", raw.len()),
        None => output.info("No raw checkpoint yet - run 'commitlore run' first"),
    }

    match store.load(experiment)? {
        Some(working) => {
            let categorized = working.count_populated(|r| r.category.is_some());
            let general = working.count_populated(|r| r.general_summary.is_some());
            let technical = working.count_populated(|r| r.technical_summary.is_some());

            output.stat(
                &format!("Experiment '{}'", experiment),
                format!("{} commits", working.len()),
            );
            output.stat("Categorized", format!("{}/{}", categorized, working.len()));
            output.stat(
                "General summaries",
                format!("{}/{}", general, working.len()),
            );
            output.stat(
                "Technical summaries",
                format!("{}/{}", technical, working.len()),
            );

            let counts = working.category_counts();
            if !counts.is_empty() {
                output.section("Category distribution");
                for (label, count) in counts {
                    output.stat(label, count);
                }
            }
        }
        None => output.info(&format!("No checkpoint for experiment '{}' yet", experiment)),
    }

    if config.database.path.exists() {
        let db = Database::open(&config.database.path)?;
        output.section("Database");
        output.stat("Commit rows", db.commit_count()?);
        output.stat("Summary rows", db.summary_count(experiment)?);
        output.stat("Log rows", db.log_count()?);
    }

    Ok(())
}

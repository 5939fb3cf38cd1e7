//! Validate Command
//!
//! Scores the working set's predicted categories against a hand-labeled
//! sample file.

use std::path::PathBuf;

use crate::checkpoint::CheckpointStore;
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::{LoreError, Result};
use crate::validation::{load_ground_truth, score_categorization};

pub fn run(labels: Option<PathBuf>) -> Result<()> {
    let output = Output::new();

    if !ConfigLoader::is_project_initialized() {
        return Err(LoreError::NotInitialized);
    }
    let config = ConfigLoader::load()?;

    let labels_path = labels
        .or_else(|| config.validation.labels_path.clone())
        .ok_or_else(|| {
            LoreError::Validation(
                "No labels file given. Pass one or set validation.labels_path".to_string(),
            )
        })?;

    let store = CheckpointStore::new(&config.checkpoint.dir);
    let working = store
        .load(&config.checkpoint.experiment)?
        .ok_or_else(|| {
            LoreError::Validation(format!(
                "No checkpoint for experiment '{}' - run 'commitlore run' first",
                config.checkpoint.experiment
            ))
        })?;

    let truth = load_ground_truth(&labels_path)?;
    let metrics = score_categorization(&working, &truth)?;

    output.section("Categorization performance");
    output.stat("Labeled commits", metrics.evaluated);
    output.stat("Precision", format!("{:.3}", metrics.precision));
    output.stat("Recall", format!("{:.3}", metrics.recall));
    output.stat("Accuracy", format!("{:.3}", metrics.accuracy));

    Ok(())
}

//! Run Command
//!
//! The full pipeline: extract -> filter -> normalize -> checkpoint, then
//! drive enrichment over the working set. Every stage is resumable - a raw
//! checkpoint skips re-extraction, and populated enrichment fields are
//! never recomputed.

use std::path::PathBuf;
use std::sync::Arc;

use crate::ai::create_provider;
use crate::checkpoint::{CheckpointStore, RAW_CHECKPOINT};
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::enrich::EnrichmentDriver;
use crate::extract::{CommitExtractor, TrivialCommitFilter, normalize_set};
use crate::index::{COMMITS_COLLECTION, ChromaIndex, OllamaEmbedder, SharedEmbedder, SharedIndex};
use crate::storage::{Database, SharedDatabase};
use crate::types::{LoreError, Result};
use crate::validation::{load_ground_truth, score_categorization};

#[derive(Debug, Default)]
pub struct RunOptions {
    pub repo: Option<PathBuf>,
    pub branch: Option<String>,
    pub experiment: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Re-execute the persistence fan-out without recomputing fields
    pub repersist: bool,
    /// Clear summary rows and index documents before the run
    pub fresh: bool,
}

pub async fn run(options: RunOptions, db: Option<SharedDatabase>) -> Result<()> {
    let output = Output::new();

    if !ConfigLoader::is_project_initialized() {
        return Err(LoreError::NotInitialized);
    }

    let mut config = ConfigLoader::load()?;
    if let Some(repo) = options.repo {
        config.repository.path = repo;
    }
    if let Some(branch) = options.branch {
        config.repository.branch = Some(branch);
    }
    if let Some(experiment) = options.experiment {
        config.checkpoint.experiment = experiment;
    }
    if let Some(provider) = options.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = options.model {
        config.llm.model = Some(model);
    }
    config.validate()?;

    let db = match db {
        Some(db) => db,
        None => Arc::new(Database::open(&config.database.path)?),
    };
    let store = CheckpointStore::new(&config.checkpoint.dir);
    let experiment = config.checkpoint.experiment.clone();

    // Stage 1: raw record set. Extraction runs exactly once; afterwards the
    // raw checkpoint is authoritative.
    let raw = match store.load(RAW_CHECKPOINT)? {
        Some(set) => {
            output.info(&format!("Loaded raw checkpoint ({} commits)", set.len()));
            set
        }
        None => {
            output.section("Extracting commits");
            let extractor = CommitExtractor::new(
                &config.repository.path,
                config.repository.branch.clone(),
            );
            let extracted = extractor.extract()?;

            let filter = TrivialCommitFilter::new(
                &config.filter.trivial_patterns,
                config.filter.min_diff_lines,
            )?;
            let mut set = filter.apply(extracted);
            normalize_set(&mut set);

            store.save(RAW_CHECKPOINT, &set)?;
            db.insert_commits(&set)?;
            output.success(&format!("{} commits ready for enrichment", set.len()));
            set
        }
    };

    // Stage 2: working set, seeded from the raw set on first run
    let working = match store.load(&experiment)? {
        Some(set) => {
            output.info(&format!(
                "Resuming experiment '{}' ({} commits)",
                experiment,
                set.len()
            ));
            set
        }
        None => raw.clone(),
    };

    // Stage 3: run-scoped service clients
    let provider = create_provider(&config.provider_config())?;
    if !provider.health_check().await.unwrap_or(false) {
        output.warning(&format!(
            "Provider '{}' is not reachable; enrichment calls will fail and be retried on the next run",
            provider.name()
        ));
    }

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

    if options.fresh {
        db.delete_all_summaries()?;
        index.clear(COMMITS_COLLECTION).await?;
        output.info("Cleared previous summaries and index documents");
    }

    // Stage 4: enrichment
    output.section("Enriching commits");
    let driver = EnrichmentDriver::new(provider, index, db.clone(), store, &experiment)
        .decoding(config.decoding_options())
        .repersist(options.repersist);
    let (working, report) = driver.run(working).await?;

    output.section("Run summary");
    output.stat("Commits processed", report.total);
    output.stat("Categories computed", report.categorized);
    output.stat("General summaries", report.general_summarized);
    output.stat("Technical summaries", report.technical_summarized);
    output.stat("Field failures", report.field_failures);
    if report.total_sink_failures() > 0 {
        for (sink, count) in &report.sink_failures {
            output.warning(&format!("Sink '{}' failed {} time(s)", sink, count));
        }
        output.info("Run again with --repersist to retry the failed sink writes");
    }

    // Categorization scoring against the hand-labeled sample, when present
    if let Some(labels_path) = &config.validation.labels_path
        && labels_path.exists()
    {
        let truth = load_ground_truth(labels_path)?;
        let metrics = score_categorization(&working, &truth)?;
        output.section("Categorization performance");
        output.stat("Labeled commits", metrics.evaluated);
        output.stat("Precision", format!("{:.3}", metrics.precision));
        output.stat("Recall", format!("{:.3}", metrics.recall));
        output.stat("Accuracy", format!("{:.3}", metrics.accuracy));
    }

    Ok(())
}

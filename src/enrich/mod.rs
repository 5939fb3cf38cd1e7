//! Enrichment Driver
//!
//! Walks the working set in ascending sequence order and fills each record's
//! empty enrichment fields by calling the injected classification and
//! summarization services. Populated fields are never recomputed, which is
//! what makes an interrupted run resumable from its checkpoint.
//!
//! After each record, four persistence actions run concurrently on a
//! `JoinSet` and are joined before the next record: the full working-set
//! checkpoint, the relational summary row, and one index upsert per summary
//! kind. Each sink's failure is reported independently; none blocks the
//! others, and none rolls another back.

pub mod categorize;
pub mod summarize;

pub use categorize::{CATEGORY_MARKER, categorize, extract_after_marker};
pub use summarize::{SummaryOutcome, generate_summary};

use std::collections::BTreeMap;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::ai::{DecodingOptions, SharedProvider};
use crate::checkpoint::CheckpointStore;
use crate::index::{COMMITS_COLLECTION, IndexDocument, SharedIndex, summary_metadata};
use crate::storage::{RetrievedDocs, SharedDatabase, SummaryRow};
use crate::types::{
    CheckpointSet, ErrorClassifier, LlmError, LoreError, Result, SummaryKind,
};

/// One of the four per-record persistence destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Checkpoint,
    Relational,
    GeneralIndex,
    TechnicalIndex,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Checkpoint => "checkpoint",
            SinkKind::Relational => "relational",
            SinkKind::GeneralIndex => "general-index",
            SinkKind::TechnicalIndex => "technical-index",
        }
    }
}

/// What a run did, for the operator summary.
#[derive(Debug, Default)]
pub struct RunReport {
    pub total: usize,
    pub categorized: usize,
    pub general_summarized: usize,
    pub technical_summarized: usize,
    /// External-service calls that failed, leaving their field empty
    pub field_failures: usize,
    /// Failed persistence actions, counted per sink
    pub sink_failures: BTreeMap<&'static str, usize>,
}

impl RunReport {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn total_sink_failures(&self) -> usize {
        self.sink_failures.values().sum()
    }
}

/// Drives enrichment over a working set with injected service clients.
///
/// All clients are scoped to the run: constructed by the caller, dropped when
/// the driver is.
pub struct EnrichmentDriver {
    provider: SharedProvider,
    index: SharedIndex,
    db: SharedDatabase,
    store: CheckpointStore,
    experiment: String,
    run_id: String,
    decoding: DecodingOptions,
    repersist: bool,
}

impl EnrichmentDriver {
    pub fn new(
        provider: SharedProvider,
        index: SharedIndex,
        db: SharedDatabase,
        store: CheckpointStore,
        experiment: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            index,
            db,
            store,
            experiment: experiment.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            decoding: DecodingOptions::default(),
            repersist: false,
        }
    }

    /// Override the base decoding options (temperature, top_p, seed).
    pub fn decoding(mut self, options: DecodingOptions) -> Self {
        self.decoding = options;
        self
    }

    /// Skip field computation and only re-execute the persistence fan-out
    /// for every record. The operator remedy for a previously failed sink.
    pub fn repersist(mut self, enabled: bool) -> Self {
        self.repersist = enabled;
        self
    }

    /// Process the working set record by record. Returns the (possibly
    /// further enriched) set and a report of what happened.
    pub async fn run(&self, mut working: CheckpointSet) -> Result<(CheckpointSet, RunReport)> {
        let total = working.len();
        let mut report = RunReport::new(total);

        for (position, idx) in working.indices().into_iter().enumerate() {
            let Some(snapshot) = working.get(idx).cloned() else {
                continue;
            };

            // Retrieval context is recorded only for fields computed in this
            // pass; already-complete fields carry empty context rows.
            let mut general_retrieved = Vec::new();
            let mut technical_retrieved = Vec::new();

            if !self.repersist {
                if snapshot.category.is_none() {
                    match categorize(&self.provider, &snapshot, &self.decoding).await {
                        Ok(category) => {
                            if let Some(record) = working.get_mut(idx) {
                                record.category = Some(category);
                            }
                            report.categorized += 1;
                        }
                        Err(e) => {
                            report.field_failures += 1;
                            self.log_field_failure("category", idx, &e);
                        }
                    }
                }

                if snapshot.general_summary.is_none() {
                    match generate_summary(
                        &self.provider,
                        &self.index,
                        &snapshot,
                        SummaryKind::General,
                        &self.decoding,
                    )
                    .await
                    {
                        Ok(outcome) => {
                            if let Some(record) = working.get_mut(idx) {
                                record.general_summary = Some(outcome.text);
                            }
                            general_retrieved = outcome.retrieved;
                            report.general_summarized += 1;
                        }
                        Err(e) => {
                            report.field_failures += 1;
                            self.log_field_failure("general_summary", idx, &e);
                        }
                    }
                }

                if snapshot.technical_summary.is_none() {
                    match generate_summary(
                        &self.provider,
                        &self.index,
                        &snapshot,
                        SummaryKind::Technical,
                        &self.decoding,
                    )
                    .await
                    {
                        Ok(outcome) => {
                            if let Some(record) = working.get_mut(idx) {
                                record.technical_summary = Some(outcome.text);
                            }
                            technical_retrieved = outcome.retrieved;
                            report.technical_summarized += 1;
                        }
                        Err(e) => {
                            report.field_failures += 1;
                            self.log_field_failure("technical_summary", idx, &e);
                        }
                    }
                }
            }

            self.persist_record(&working, idx, general_retrieved, technical_retrieved, &mut report)
                .await?;

            if let Some(record) = working.get(idx) {
                info!(
                    hash = record.short_hash(),
                    "Processed {}/{} commits",
                    position + 1,
                    total
                );
            }
        }

        Ok((working, report))
    }

    /// Fan out the four persistence actions for one record and join them.
    ///
    /// The checkpoint snapshot is encoded on this thread before anything is
    /// spawned, so no sink ever observes a mid-mutation set.
    async fn persist_record(
        &self,
        working: &CheckpointSet,
        idx: u32,
        general_retrieved: Vec<crate::index::ScoredDocument>,
        technical_retrieved: Vec<crate::index::ScoredDocument>,
        report: &mut RunReport,
    ) -> Result<()> {
        let record = working
            .get(idx)
            .cloned()
            .ok_or_else(|| LoreError::Storage(format!("Record {} vanished mid-run", idx)))?;

        let encoded = CheckpointStore::encode(working)?;
        let checkpoint_path = self.store.path_for(&self.experiment);

        let row = SummaryRow {
            commit_id: idx,
            experiment: self.experiment.clone(),
            run_id: self.run_id.clone(),
            date: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            category: record.category.map(|c| c.label().to_string()),
            general_summary: record.general_summary.clone(),
            general_retrieved: RetrievedDocs::from_scored(&general_retrieved)?,
            technical_summary: record.technical_summary.clone(),
            technical_retrieved: RetrievedDocs::from_scored(&technical_retrieved)?,
        };

        let mut join_set: JoinSet<(SinkKind, Result<()>)> = JoinSet::new();

        join_set.spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || {
                    CheckpointStore::write_encoded(&checkpoint_path, &encoded)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(LoreError::Storage(format!("Checkpoint task failed: {}", e)))
                });
            (SinkKind::Checkpoint, result)
        });

        let db = self.db.clone();
        join_set.spawn(async move {
            let result = tokio::task::spawn_blocking(move || db.insert_summary(&row))
                .await
                .unwrap_or_else(|e| {
                    Err(LoreError::Storage(format!("Summary insert task failed: {}", e)))
                });
            (SinkKind::Relational, result)
        });

        for (kind, sink, summary) in [
            (
                SummaryKind::General,
                SinkKind::GeneralIndex,
                record.general_summary.clone(),
            ),
            (
                SummaryKind::Technical,
                SinkKind::TechnicalIndex,
                record.technical_summary.clone(),
            ),
        ] {
            let index = self.index.clone();
            let doc = summary.map(|text| IndexDocument {
                id: format!("{}-{}", idx, kind.as_str()),
                text,
                metadata: summary_metadata(&record, idx, kind),
            });
            join_set.spawn(async move {
                let result = match doc {
                    Some(doc) => index.upsert(COMMITS_COLLECTION, doc).await,
                    // Nothing to index until the field is computed
                    None => Ok(()),
                };
                (sink, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((sink, Err(e))) => {
                    warn!(index = idx, sink = sink.as_str(), "sink write failed: {}", e);
                    *report.sink_failures.entry(sink.as_str()).or_insert(0) += 1;
                }
                Err(e) => {
                    warn!(index = idx, "persistence task panicked: {}", e);
                    *report.sink_failures.entry("unknown").or_insert(0) += 1;
                }
            }
        }

        Ok(())
    }

    fn log_field_failure(&self, field: &str, idx: u32, err: &LoreError) {
        let classified = match err {
            LoreError::Llm(e) => e.clone(),
            LoreError::LlmApi(message) => ErrorClassifier::classify(message, self.provider.name()),
            other => LlmError::from_message(other.to_string()),
        };
        warn!(index = idx, field, "enrichment call failed: {}", classified);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Completion, DecodingOptions, TextCompletion};
    use crate::extract::TrivialCommitFilter;
    use crate::index::{DocumentIndex, ScoredDocument, SearchRequest};
    use crate::storage::Database;
    use crate::types::{Category, CommitRecord};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct MockProvider {
        calls: AtomicUsize,
        category_answer: String,
        fail_summaries: bool,
    }

    impl MockProvider {
        fn new(category_answer: &str, fail_summaries: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                category_answer: category_answer.to_string(),
                fail_summaries,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextCompletion for MockProvider {
        async fn complete(&self, prompt: &str, _options: &DecodingOptions) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.ends_with(CATEGORY_MARKER) {
                Ok(Completion::text_only(self.category_answer.clone()))
            } else if self.fail_summaries {
                Err(LoreError::LlmApi("mock summarization outage".to_string()))
            } else {
                Ok(Completion::text_only("A generated summary."))
            }
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct MockIndex {
        upserts: std::sync::Mutex<Vec<String>>,
        fail_upserts: bool,
    }

    #[async_trait]
    impl DocumentIndex for MockIndex {
        async fn upsert(&self, _collection: &str, doc: IndexDocument) -> Result<()> {
            if self.fail_upserts {
                return Err(LoreError::Index("mock index outage".to_string()));
            }
            self.upserts.lock().unwrap().push(doc.id);
            Ok(())
        }

        async fn search(
            &self,
            _collection: &str,
            _request: &SearchRequest,
        ) -> Result<Vec<ScoredDocument>> {
            Ok(Vec::new())
        }

        async fn clear(&self, _collection: &str) -> Result<()> {
            Ok(())
        }
    }

    fn record(message: &str, diff_lines: usize) -> CommitRecord {
        let diff = (0..diff_lines)
            .map(|i| format!("+line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        CommitRecord {
            hash: format!("hash-{}", message.len()),
            author: "A <a@example.com>".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: message.to_string(),
            files_changed: vec!["vm.c".to_string()],
            diffs: BTreeMap::from([("vm.c".to_string(), diff)]),
            category: None,
            general_summary: None,
            technical_summary: None,
        }
    }

    struct Harness {
        provider: Arc<MockProvider>,
        index: Arc<MockIndex>,
        db: SharedDatabase,
        driver: EnrichmentDriver,
        _dir: TempDir,
    }

    fn harness(provider: MockProvider, index: MockIndex) -> Harness {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(provider);
        let index = Arc::new(index);
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let driver = EnrichmentDriver::new(
            provider.clone(),
            index.clone(),
            db.clone(),
            CheckpointStore::new(dir.path()),
            "test1",
        );
        Harness {
            provider,
            index,
            db,
            driver,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_filter_then_categorize() {
        // Three raw commits; B is trivial and never reaches the driver
        let raw: CheckpointSet = vec![
            record("Implement parser", 10),
            record("fix typo", 10),
            record("Implement lexer", 10),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, r)| (i as u32, r))
        .collect();

        let filtered = TrivialCommitFilter::with_defaults().unwrap().apply(raw);
        assert_eq!(filtered.indices(), vec![0, 1]);

        // Classification always answers "Bug Fix"; summarization is down
        let h = harness(MockProvider::new("Bug Fix", true), MockIndex::default());
        let (enriched, report) = h.driver.run(filtered).await.unwrap();

        for (_, r) in enriched.iter() {
            assert_eq!(r.category, Some(Category::BugFix));
            assert_eq!(r.general_summary, None);
            assert_eq!(r.technical_summary, None);
        }
        assert_eq!(report.categorized, 2);
        assert_eq!(report.field_failures, 4);
        assert_eq!(h.db.summary_count("test1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fully_enriched_set_issues_zero_calls() {
        let mut set = CheckpointSet::new();
        let mut r = record("Implement parser", 10);
        r.category = Some(Category::FeatureUpdate);
        r.general_summary = Some("Done.".to_string());
        r.technical_summary = Some("Done technically.".to_string());
        set.insert(0, r);

        let h = harness(MockProvider::new("Bug Fix", false), MockIndex::default());
        let (out, report) = h.driver.run(set.clone()).await.unwrap();

        assert_eq!(h.provider.call_count(), 0);
        assert_eq!(out, set);
        assert_eq!(report.categorized, 0);
        assert_eq!(report.field_failures, 0);
    }

    #[tokio::test]
    async fn test_category_is_monotonic() {
        let mut set = CheckpointSet::new();
        let mut r = record("Implement parser", 10);
        r.category = Some(Category::FeatureUpdate);
        set.insert(0, r);

        // The mock would answer "Bug Fix" if asked
        let h = harness(MockProvider::new("Bug Fix", false), MockIndex::default());
        let (out, _) = h.driver.run(set).await.unwrap();

        assert_eq!(out.get(0).unwrap().category, Some(Category::FeatureUpdate));
        // Only the two summary fields were computed
        assert_eq!(h.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_block_others() {
        let mut set = CheckpointSet::new();
        set.insert(0, record("Implement parser", 10));
        set.insert(1, record("Implement lexer", 10));

        let h = harness(
            MockProvider::new("Refactoring", false),
            MockIndex {
                fail_upserts: true,
                ..Default::default()
            },
        );
        let (out, report) = h.driver.run(set).await.unwrap();

        // Index sinks failed for both records and both kinds
        assert_eq!(report.sink_failures.get("general-index"), Some(&2));
        assert_eq!(report.sink_failures.get("technical-index"), Some(&2));
        // The relational sink and the checkpoint were unaffected
        assert_eq!(h.db.summary_count("test1").unwrap(), 2);
        assert!(report.sink_failures.get("relational").is_none());
        assert!(report.sink_failures.get("checkpoint").is_none());
        // Both records were still fully enriched
        assert!(out.get(1).unwrap().fully_enriched());
    }

    #[tokio::test]
    async fn test_checkpoint_written_after_each_record() {
        let mut set = CheckpointSet::new();
        set.insert(0, record("Implement parser", 10));

        let h = harness(MockProvider::new("Feature Update", false), MockIndex::default());
        let (_, report) = h.driver.run(set).await.unwrap();
        assert_eq!(report.total_sink_failures(), 0);

        let store = CheckpointStore::new(h._dir.path());
        let persisted = store.load("test1").unwrap().unwrap();
        assert!(persisted.get(0).unwrap().fully_enriched());
    }

    #[tokio::test]
    async fn test_repersist_skips_computation_but_writes_sinks() {
        let mut set = CheckpointSet::new();
        let mut r = record("Implement parser", 10);
        r.category = Some(Category::FeatureUpdate);
        r.general_summary = Some("Summary.".to_string());
        r.technical_summary = Some("Technical summary.".to_string());
        set.insert(0, r);

        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new("Bug Fix", false));
        let index = Arc::new(MockIndex::default());
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let driver = EnrichmentDriver::new(
            provider.clone(),
            index.clone(),
            db.clone(),
            CheckpointStore::new(dir.path()),
            "test1",
        )
        .repersist(true);

        let (_, report) = driver.run(set).await.unwrap();

        assert_eq!(provider.call_count(), 0);
        assert_eq!(report.total_sink_failures(), 0);
        assert_eq!(db.summary_count("test1").unwrap(), 1);
        let ids = index.upserts.lock().unwrap().clone();
        assert!(ids.contains(&"0-general".to_string()));
        assert!(ids.contains(&"0-technical".to_string()));
    }
}

//! Database Layer with Connection Pooling and Safe Transactions
//!
//! Production-ready SQLite database layer featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked migrations
//! - WAL mode for optimal read/write performance
//!
//! The database is one of the enrichment driver's four persistence sinks:
//! the `commits` table holds the raw record set keyed by sequence index,
//! and `summaries` receives one append-only row per enriched record.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};

use crate::index::ScoredDocument;
use crate::types::{CheckpointSet, LoreError, Result, ResultExt};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 2;

/// Migration definitions
struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 2,
    description: "Add run_id column to summaries",
    up: "ALTER TABLE summaries ADD COLUMN run_id TEXT",
}];

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 4;
    const MAX_POOL_SIZE: u32 = 16;

    /// Pool size from CPU count, clamped to sensible bounds. The driver is
    /// sequential across records, so the pool only has to absorb the
    /// persistence fan-out plus the log layer.
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        let max_size = cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE);
        Self {
            max_size,
            min_idle: (max_size / 4).max(2),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Summary row captured at persistence time for one record.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub commit_id: u32,
    pub experiment: String,
    pub run_id: String,
    pub date: String,
    pub category: Option<String>,
    pub general_summary: Option<String>,
    pub general_retrieved: RetrievedDocs,
    pub technical_summary: Option<String>,
    pub technical_retrieved: RetrievedDocs,
}

/// Serialized retrieval context stored alongside a summary.
#[derive(Debug, Clone, Default)]
pub struct RetrievedDocs {
    pub docs_json: String,
    pub count: usize,
    pub scores_json: String,
}

impl RetrievedDocs {
    pub fn from_scored(docs: &[ScoredDocument]) -> Result<Self> {
        let serialized: Vec<serde_json::Value> = docs
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "text": d.text,
                    "score": d.score,
                })
            })
            .collect();
        let scores: Vec<f32> = docs.iter().map(|d| d.score).collect();

        Ok(Self {
            docs_json: serde_json::to_string(&serialized)?,
            count: docs.len(),
            scores_json: serde_json::to_string(&scores)?,
        })
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| LoreError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| LoreError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Configure a new connection with production-ready settings.
    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            LoreError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        // Set version to current since schema.sql includes all columns
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;

        drop(conn);
        // Migrations only needed for existing databases with older versions
        self.migrate()?;
        Ok(())
    }

    /// Run version-tracked migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        for migration in MIGRATIONS {
            if migration.version > current_version {
                conn.execute_batch(migration.up).with_context_fn(|| {
                    format!(
                        "Failed to apply migration {}: {}",
                        migration.version, migration.description
                    )
                })?;
            }
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to update schema version")?;
        }

        Ok(())
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// All operations within the closure are atomic. If the closure panics,
    /// the transaction is rolled back and an error is returned instead of
    /// poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                Err(LoreError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Bulk-insert the raw record set. Existing rows (by hash) are left
    /// untouched so reruns are idempotent.
    pub fn insert_commits(&self, set: &CheckpointSet) -> Result<usize> {
        self.transaction(|conn| {
            let mut inserted = 0;
            let mut stmt = conn.prepare(
                "INSERT OR IGNORE INTO commits (id, commit_hash, author, date, message, files, diffs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for (index, record) in set.iter() {
                inserted += stmt.execute(params![
                    index,
                    record.hash,
                    record.author,
                    record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    record.message,
                    serde_json::to_string(&record.files_changed)?,
                    serde_json::to_string(&record.diffs)?,
                ])?;
            }
            Ok(inserted)
        })
    }

    pub fn commit_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    /// Append one enrichment-state row.
    pub fn insert_summary(&self, row: &SummaryRow) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO summaries (commit_id, experiment, run_id, date, category,
                    general_summary, general_retrieved_docs, general_retrieved_count,
                    general_retrieved_scores, technical_summary, technical_retrieved_docs,
                    technical_retrieved_count, technical_retrieved_scores)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    row.commit_id,
                    row.experiment,
                    row.run_id,
                    row.date,
                    row.category,
                    row.general_summary,
                    row.general_retrieved.docs_json,
                    row.general_retrieved.count,
                    row.general_retrieved.scores_json,
                    row.technical_summary,
                    row.technical_retrieved.docs_json,
                    row.technical_retrieved.count,
                    row.technical_retrieved.scores_json,
                ],
            )
            .with_context("Failed to insert summary")?;
        Ok(())
    }

    pub fn summary_count(&self, experiment: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM summaries WHERE experiment = ?1",
            params![experiment],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete all summaries and reset the autoincrement counter.
    pub fn delete_all_summaries(&self) -> Result<()> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM summaries", [])?;
            // sqlite_sequence row only exists once an autoincrement insert happened
            let _ = conn.execute("DELETE FROM sqlite_sequence WHERE name='summaries'", []);
            Ok(())
        })
    }

    // =========================================================================
    // Logs
    // =========================================================================

    /// Append a log row. Called from the tracing layer; must not itself emit
    /// tracing events.
    pub fn insert_log(&self, created: &str, level: &str, message: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO logs (created, level, message) VALUES (?1, ?2, ?3)",
            params![created, level, message],
        )?;
        Ok(())
    }

    pub fn log_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommitRecord;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn sample_set() -> CheckpointSet {
        let mut set = CheckpointSet::new();
        for i in 0..3u32 {
            set.insert(
                i,
                CommitRecord {
                    hash: format!("hash{}", i),
                    author: "A <a@example.com>".to_string(),
                    timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                    message: format!("Add feature {}.", i),
                    files_changed: vec!["vm.c".to_string()],
                    diffs: BTreeMap::from([("vm.c".to_string(), "+x".to_string())]),
                    category: None,
                    general_summary: None,
                    technical_summary: None,
                },
            );
        }
        set
    }

    fn sample_row(commit_id: u32) -> SummaryRow {
        SummaryRow {
            commit_id,
            experiment: "test1".to_string(),
            run_id: "run-1".to_string(),
            date: "2026-01-01 00:00:00".to_string(),
            category: Some("Bug Fix".to_string()),
            general_summary: Some("A general summary.".to_string()),
            general_retrieved: RetrievedDocs::from_scored(&[]).unwrap(),
            technical_summary: None,
            technical_retrieved: RetrievedDocs::from_scored(&[]).unwrap(),
        }
    }

    #[test]
    fn test_insert_commits_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let set = sample_set();

        assert_eq!(db.insert_commits(&set).unwrap(), 3);
        // Second insert is a no-op thanks to INSERT OR IGNORE
        assert_eq!(db.insert_commits(&set).unwrap(), 0);
        assert_eq!(db.commit_count().unwrap(), 3);
    }

    #[test]
    fn test_insert_and_count_summaries() {
        let db = Database::open_in_memory().unwrap();
        db.insert_summary(&sample_row(0)).unwrap();
        db.insert_summary(&sample_row(1)).unwrap();

        assert_eq!(db.summary_count("test1").unwrap(), 2);
        assert_eq!(db.summary_count("other").unwrap(), 0);
    }

    #[test]
    fn test_delete_all_summaries() {
        let db = Database::open_in_memory().unwrap();
        db.insert_summary(&sample_row(0)).unwrap();
        db.delete_all_summaries().unwrap();
        assert_eq!(db.summary_count("test1").unwrap(), 0);
    }

    #[test]
    fn test_logs_table() {
        let db = Database::open_in_memory().unwrap();
        db.insert_log("2026-01-01T00:00:00Z", "INFO", "hello").unwrap();
        assert_eq!(db.log_count().unwrap(), 1);
    }

    #[test]
    fn test_retrieved_docs_serialization() {
        let docs = vec![ScoredDocument {
            id: "3".to_string(),
            text: "doc text".to_string(),
            score: 0.83,
            metadata: None,
        }];
        let retrieved = RetrievedDocs::from_scored(&docs).unwrap();
        assert_eq!(retrieved.count, 1);
        assert!(retrieved.docs_json.contains("doc text"));
        assert!(retrieved.scores_json.starts_with('['));
    }
}

//! commitlore - Commit-History Mining and Enrichment Pipeline
//!
//! Mines a repository's commit history, filters and normalizes it, and
//! enriches each commit with an LLM-assigned category and two summaries,
//! checkpointing after every record so interrupted runs resume where they
//! stopped.
//!
//! ## Core Features
//!
//! - **Resumable Enrichment**: full-snapshot checkpoints with CRC32
//!   integrity; populated fields are never recomputed
//! - **Trivial-Commit Filtering**: pattern and size heuristics with dense
//!   index renumbering
//! - **Fan-Out Persistence**: checkpoint, relational row, and two index
//!   upserts run concurrently per record and fail independently
//! - **Injected Clients**: provider, embedder, index, and database handles
//!   are scoped to a run, never process-wide singletons
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use commitlore::{
//!     CheckpointStore, CommitExtractor, Database, EnrichmentDriver,
//!     TrivialCommitFilter, normalize_set,
//! };
//!
//! let mut set = CommitExtractor::new("./repo", None).extract()?;
//! set = TrivialCommitFilter::with_defaults()?.apply(set);
//! normalize_set(&mut set);
//!
//! let store = CheckpointStore::new(".commitlore/checkpoints");
//! store.save("raw", &set)?;
//!
//! let driver = EnrichmentDriver::new(provider, index, db, store, "baseline");
//! let (enriched, report) = driver.run(set).await?;
//! ```
//!
//! ## Modules
//!
//! - [`extract`]: history walking, trivial filtering, message normalization
//! - [`checkpoint`]: full-snapshot checkpoint store
//! - [`enrich`]: the enrichment driver and its persistence fan-out
//! - [`ai`]: text-completion providers and prompt builders
//! - [`index`]: document index and embedding clients
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`validation`]: categorization scoring against hand labels

pub mod ai;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod extract;
pub mod index;
pub mod storage;
pub mod types;
pub mod validation;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, LoreError, Result, ResultExt};

// Domain Types
pub use types::{Category, CheckpointSet, CommitRecord, SummaryKind};

// Storage
pub use storage::{Database, DbLogLayer, PoolConfig, SharedDatabase};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use checkpoint::{CheckpointStore, RAW_CHECKPOINT};
pub use enrich::{EnrichmentDriver, RunReport, SinkKind};
pub use extract::{CommitExtractor, DocScanner, TrivialCommitFilter, normalize_message, normalize_set};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    Completion,
    DecodingOptions,
    OllamaProvider,
    OpenAiProvider,
    SharedProvider,
    TextCompletion,
    create_provider,
};

// =============================================================================
// Index Re-exports
// =============================================================================

pub use index::{
    ChromaIndex, DocumentIndex, Embedder, IndexDocument, OllamaEmbedder, ScoredDocument,
    SearchRequest, SharedIndex,
};

//! Storage Layer
//!
//! SQLite persistence with connection pooling, plus the tracing layer that
//! mirrors log events into the database.

pub mod database;
pub mod log_layer;

pub use database::{Database, PoolConfig, RetrievedDocs, SharedDatabase, SummaryRow};
pub use log_layer::DbLogLayer;

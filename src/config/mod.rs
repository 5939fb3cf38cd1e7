//! Configuration
//!
//! Layered configuration: defaults, global file, project file, environment.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    CheckpointConfig, Config, DatabaseConfig, EmbeddingConfig, FilterConfig, IndexConfig,
    LlmConfig, RepositoryConfig, ValidationConfig,
};

//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/commitlore/) and project (.commitlore/) level
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::{DecodingOptions, ProviderConfig};
use crate::constants::{llm, paths};
use crate::extract::{DEFAULT_MIN_DIFF_LINES, DEFAULT_TRIVIAL_PATTERNS};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Mined repository settings
    pub repository: RepositoryConfig,

    /// Trivial-commit filter settings
    pub filter: FilterConfig,

    /// Checkpoint settings
    pub checkpoint: CheckpointConfig,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Embedding client settings
    pub embedding: EmbeddingConfig,

    /// Document index settings
    pub index: IndexConfig,

    /// Relational sink settings
    pub database: DatabaseConfig,

    /// Categorization validation settings
    pub validation: ValidationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            repository: RepositoryConfig::default(),
            filter: FilterConfig::default(),
            checkpoint: CheckpointConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            database: DatabaseConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LoreError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(crate::types::LoreError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(crate::types::LoreError::Config(format!(
                "LLM top_p must be between 0.0 and 1.0, got {}",
                self.llm.top_p
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(crate::types::LoreError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.checkpoint.experiment.trim().is_empty() {
            return Err(crate::types::LoreError::Config(
                "Checkpoint experiment name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Provider configuration for the text-completion client.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.llm.provider.clone(),
            model: self.llm.model.clone(),
            timeout_secs: self.llm.timeout_secs,
            api_key: self.llm.api_key.clone(),
            api_base: self.llm.api_base.clone(),
        }
    }

    /// Base decoding options; per-call token caps are applied by the driver.
    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            max_tokens: llm::SUMMARY_MAX_TOKENS,
            temperature: self.llm.temperature,
            top_p: self.llm.top_p,
            seed: self.llm.seed,
        }
    }
}

// =============================================================================
// Repository Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Path to the local repository to mine
    pub path: PathBuf,

    /// Branch to walk; the repository HEAD when unset
    pub branch: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            branch: None,
        }
    }
}

// =============================================================================
// Filter Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Case-insensitive regex patterns identifying low-value messages
    pub trivial_patterns: Vec<String>,

    /// Minimum total changed-line count for a commit to survive
    pub min_diff_lines: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            trivial_patterns: DEFAULT_TRIVIAL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            min_diff_lines: DEFAULT_MIN_DIFF_LINES,
        }
    }
}

// =============================================================================
// Checkpoint Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory holding checkpoint files
    pub dir: PathBuf,

    /// Name of the working checkpoint; also tags summary rows
    pub experiment: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(paths::PROJECT_DIR).join(paths::CHECKPOINT_DIR),
            experiment: "baseline".to_string(),
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type: "ollama", "openai"
    pub provider: String,

    /// Model name (provider-specific default when unset)
    pub model: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// API key; also read from the provider's environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Nucleus sampling threshold
    pub top_p: f32,

    /// Fixed seed for reproducibility
    pub seed: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            api_base: None,
            api_key: None,
            timeout_secs: llm::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            top_p: 0.8,
            seed: llm::DEFAULT_SEED,
        }
    }
}

// =============================================================================
// Embedding Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model (provider default when unset)
    pub model: Option<String>,

    /// Embedding endpoint (defaults to the local Ollama endpoint)
    pub api_base: Option<String>,
}

// =============================================================================
// Index Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Document index endpoint (Chroma-compatible)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout_secs: 60,
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(paths::PROJECT_DIR).join(paths::DATABASE_FILE),
        }
    }
}

// =============================================================================
// Validation Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Hand-labeled category file, one label per line, oldest first
    pub labels_path: Option<PathBuf>,
}

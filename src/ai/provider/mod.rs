//! Text-Completion Provider Abstraction
//!
//! Defines the TextCompletion trait for plain-text LLM output.
//! All providers return `Completion` with token usage metrics for cost
//! tracking.
//!
//! Providers are constructed explicitly from configuration and injected into
//! the enrichment driver; nothing here is a process-wide singleton.

mod ollama;
mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::Result;

// =============================================================================
// Completion with Usage Metrics
// =============================================================================

/// Complete provider response including text, usage metrics, and timing
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl Completion {
    /// Create a completion with text only (usage unknown)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }

    pub fn with_metrics(
        text: String,
        usage: TokenUsage,
        timing: ResponseTiming,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            text,
            usage,
            timing,
            metadata,
        }
    }
}

/// Token usage metrics for cost tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// Create from Ollama-style usage response
    pub fn from_ollama(prompt_eval_count: u32, eval_count: u32) -> Self {
        Self {
            input_tokens: prompt_eval_count,
            output_tokens: eval_count,
        }
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Model used
    pub model: String,
    /// Provider name
    pub provider: String,
}

/// Shared provider handle injected into the driver for the duration of a run.
pub type SharedProvider = Arc<dyn TextCompletion>;

// =============================================================================
// Decoding Options
// =============================================================================

/// Per-call decoding options.
///
/// Classification uses a short, deterministic configuration; summarization a
/// longer one. The seed is fixed per run for reproducibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecodingOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Fixed seed for reproducibility
    pub seed: u64,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
            top_p: 0.8,
            seed: crate::constants::llm::DEFAULT_SEED,
        }
    }
}

impl DecodingOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for text-completion providers
///
/// Note: API keys are handled securely - they are never serialized to output
/// and are redacted in debug output. Each provider converts the key to
/// SecretString internally for runtime protection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "ollama", "openai"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// API key (for OpenAI etc.)
    /// Never serialized to output for security
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            timeout_secs: 300,
            api_key: None,
            api_base: None,
        }
    }
}

// =============================================================================
// Text Completion Trait
// =============================================================================

/// Text-completion provider trait with usage metrics
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Generate a plain-text completion for `prompt`.
    ///
    /// Returns `Completion` containing both the text and usage metrics.
    async fn complete(&self, prompt: &str, options: &DecodingOptions) -> Result<Completion>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.clone())?)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        _ => Err(crate::types::LoreError::Config(format!(
            "Unknown provider: {}. Supported: ollama, openai",
            config.provider
        ))),
    }
}

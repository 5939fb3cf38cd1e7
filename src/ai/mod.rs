//! AI Layer
//!
//! Text-completion provider abstraction and prompt builders.

pub mod prompt;
pub mod provider;

pub use provider::{
    Completion, DecodingOptions, OllamaProvider, OpenAiProvider, ProviderConfig, SharedProvider,
    TextCompletion, TokenUsage, create_provider,
};

//! Commit Summarization
//!
//! Generates general and technical summaries, optionally seeding the prompt
//! with similar previously-indexed summaries of the same kind.

use tracing::{debug, warn};

use crate::ai::prompt;
use crate::ai::{DecodingOptions, SharedProvider};
use crate::constants::llm::SUMMARY_MAX_TOKENS;
use crate::index::{COMMITS_COLLECTION, ScoredDocument, SearchRequest, SharedIndex};
use crate::types::{CommitRecord, LoreError, Result, SummaryKind};

/// A generated summary plus the retrieval context that informed it.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub text: String,
    pub retrieved: Vec<ScoredDocument>,
}

pub async fn generate_summary(
    provider: &SharedProvider,
    index: &SharedIndex,
    record: &CommitRecord,
    kind: SummaryKind,
    base: &DecodingOptions,
) -> Result<SummaryOutcome> {
    let base_prompt = match kind {
        SummaryKind::General => prompt::general_summary_prompt(record),
        SummaryKind::Technical => prompt::technical_summary_prompt(record),
    };

    // A failed lookup degrades to an uncontextualized prompt; only the
    // completion call itself can fail the field.
    let request = SearchRequest::new(&base_prompt).with_kind(kind);
    let retrieved = match index.search(COMMITS_COLLECTION, &request).await {
        Ok(docs) => {
            debug!(kind = %kind, found = docs.len(), "similar summaries retrieved");
            docs
        }
        Err(e) => {
            warn!("Similarity lookup failed, continuing without context: {}", e);
            Vec::new()
        }
    };

    let full_prompt = prompt::with_retrieved_context(&base_prompt, &retrieved);
    let options = base.with_max_tokens(SUMMARY_MAX_TOKENS);
    let completion = provider.complete(&full_prompt, &options).await?;

    let text = completion.text.trim().to_string();
    if text.is_empty() {
        return Err(LoreError::llm(format!("Empty {} summary returned", kind)));
    }

    Ok(SummaryOutcome { text, retrieved })
}

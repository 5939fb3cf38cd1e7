//! Commit Classification
//!
//! Asks the text-completion service for a category and maps the free-text
//! answer onto the fixed taxonomy.

use crate::ai::prompt;
use crate::ai::{DecodingOptions, SharedProvider};
use crate::constants::llm::CLASSIFY_MAX_TOKENS;
use crate::types::{Category, CommitRecord, Result};

/// Marker the categorization prompt ends with; the answer is whatever the
/// model produced after its last occurrence.
pub const CATEGORY_MARKER: &str = "Category:";

/// The text following the last occurrence of `marker`, or the whole text
/// when the marker is absent.
pub fn extract_after_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    text.rsplit(marker).next().unwrap_or(text).trim()
}

pub async fn categorize(
    provider: &SharedProvider,
    record: &CommitRecord,
    base: &DecodingOptions,
) -> Result<Category> {
    let prompt = prompt::categorization_prompt(record);
    let options = base.with_max_tokens(CLASSIFY_MAX_TOKENS);

    let completion = provider.complete(&prompt, &options).await?;
    let answer = extract_after_marker(&completion.text, CATEGORY_MARKER);
    Ok(Category::from_model_output(answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_after_marker() {
        assert_eq!(
            extract_after_marker("blah blah Category: Bug Fix", "Category:"),
            "Bug Fix"
        );
        // Last occurrence wins when the model echoes the prompt
        assert_eq!(
            extract_after_marker("Category: ignore this Category: Refactoring", "Category:"),
            "Refactoring"
        );
        assert_eq!(
            extract_after_marker("Feature Update", "Category:"),
            "Feature Update"
        );
    }

    #[test]
    fn test_marker_answer_maps_to_taxonomy() {
        let answer = extract_after_marker("Category:  bug fix.", CATEGORY_MARKER);
        assert_eq!(Category::from_model_output(answer), Category::BugFix);
    }
}

//! Prompt Builders
//!
//! Few-shot prompt templates for commit classification and summarization.
//! Builders format a `CommitRecord` into the shared commit-details block and
//! splice it into the task template; retrieved similar summaries are appended
//! as extra few-shot context when available.

use crate::index::ScoredDocument;
use crate::types::{Category, CommitRecord};

/// Per-file diff text is truncated to this many characters in prompts.
pub const DIFF_SNIPPET_MAX: usize = 1_000;

/// Removes blank lines and leading/trailing indentation from a template so
/// source-level formatting does not leak into the prompt.
pub fn clean_text_paragraph(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shared commit-details block used by every task prompt.
fn commit_details(record: &CommitRecord) -> String {
    let diffs = record
        .diffs
        .iter()
        .map(|(file, diff)| {
            let snippet: String = diff.chars().take(DIFF_SNIPPET_MAX).collect();
            format!("{}: {}", file, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Commit Informations:\n\
         Hash (unique identifier): {}\n\
         Author: {}\n\
         Date: {}\n\
         Commit Message: {}\n\
         Changed Files: {}\n\
         Diffs: {}",
        record.hash,
        record.author,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.message,
        record.files_changed.join(", "),
        diffs
    )
}

fn categories_list() -> String {
    Category::ALL
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Few-shot categorization prompt. The model is asked to end its answer with
/// a `Category:` marker holding one label from the fixed list.
pub fn categorization_prompt(record: &CommitRecord) -> String {
    let template = format!(
        r#"
        You are tasked with categorizing commits based on their purpose and significance. Use the following categories:

        {categories}

        **Instructions:**
        1. Review the commit information carefully, including the message, modified files, and code diffs.
        2. Classify the commit into one of the provided categories.
        3. Provide a single category from the list based on the purpose and significance of the changes.

        **Example 1:**
        Commit Informations:
        Hash (unique identifier): 1a2b3c4d
        Author: John Doe
        Date: 2025-01-01 10:00:00
        Commit Message: Refactor the user authentication module to improve performance and readability.
        Changed Files: auth.py, user_model.py
        Diffs: auth.py: -def authenticate_user(username, password)
        +def authenticate_user(user_credentials)
        Category: Refactoring

        **Example 2:**
        Commit Informations:
        Hash (unique identifier): 3c2b1a4f
        Author: Alex Brown
        Date: 2025-01-03 12:00:00
        Commit Message: Update the README with installation instructions.
        Changed Files: README.md
        Diffs: README.md: +## Installation
        +Run the following command to install
        Category: Documentation Update

        **Example 3:**
        Commit Informations:
        Hash (unique identifier): 9f8e7d6c
        Author: Jane Smith
        Date: 2025-01-02 15:00:00
        Commit Message: Fix incorrect handling of null values in user profile updates.
        Changed Files: profile.py
        Diffs: profile.py: -if user['name']
        +if user.get('name') is not None
        Category: Bug Fix

        Now, analyze the following commit:

        {details}

        Provide the category based on the purpose and significance of the commit.
        Category:
        "#,
        categories = categories_list(),
        details = commit_details(record),
    );

    clean_text_paragraph(&template)
}

/// Few-shot general summarization prompt.
pub fn general_summary_prompt(record: &CommitRecord) -> String {
    let template = format!(
        r#"
        You are a helpful assistant. Provide a concise description of what has been done in the following commit.
        Focus on the intent of the change and its effect on the project, in language a reviewer can act on.

        **Example:**
        Commit Informations:
        Hash (unique identifier): 1a2b3c4d
        Author: John Doe
        Date: 2025-01-01 10:00:00
        Commit Message: Refactor the user authentication module.
        Changed Files: auth.py, user_model.py
        Diffs: auth.py: -def authenticate_user(username, password)
        +def authenticate_user(user_credentials)
        Answer:
        Refactored the user authentication system to improve both performance and readability.
        The authenticate_user function now accepts a single credentials object, simplifying the interface and centralizing validation logic for easier future updates.

        Now analyze the following commit:

        {details}

        Answer:
        "#,
        details = commit_details(record),
    );

    clean_text_paragraph(&template)
}

/// Few-shot technical summarization prompt. Same shape as the general
/// summary with a technical-focus instruction.
pub fn technical_summary_prompt(record: &CommitRecord) -> String {
    let template = format!(
        r#"
        You are a senior engineer. Provide a technical summary of the following commit.
        Focus on the concrete code-level changes: functions and data structures touched, signatures changed, algorithms affected, and their implications.

        **Example:**
        Commit Informations:
        Hash (unique identifier): b2c4d6e8
        Author: Alice Brown
        Date: 2024-03-15 16:42:10
        Commit Message: Fix scope handling for function declarations.
        Changed Files: jscompiler.c
        Diffs: jscompiler.c: -static void compile_function_body(JF, js_Ast *name, js_Ast *params, js_Ast *body, int is_fun_exp)
        +static void compile_function_body(JF, js_Ast *name, js_Ast *params, js_Ast *body)
        Answer:
        Removed the is_fun_exp parameter from compile_function_body and create_function, simplifying how function declaration bindings are compiled.
        Function declarations now follow the expected scope rules without the expression-specific flag threading through the compiler.

        Now analyze the following commit:

        {details}

        Answer:
        "#,
        details = commit_details(record),
    );

    clean_text_paragraph(&template)
}

/// Append retrieved similar summaries to a prompt as extra few-shot context.
pub fn with_retrieved_context(prompt: &str, retrieved: &[ScoredDocument]) -> String {
    if retrieved.is_empty() {
        return prompt.to_string();
    }

    let context = retrieved
        .iter()
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n\nPrevious similar commits:\n{}", prompt, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn record() -> CommitRecord {
        CommitRecord {
            hash: "abc12345".to_string(),
            author: "Jane <jane@example.com>".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: "Fix overflow in lexer.".to_string(),
            files_changed: vec!["lexer.c".to_string()],
            diffs: BTreeMap::from([("lexer.c".to_string(), "+check(len);".to_string())]),
            category: None,
            general_summary: None,
            technical_summary: None,
        }
    }

    #[test]
    fn test_clean_text_paragraph() {
        let cleaned = clean_text_paragraph("  line one  \n\n\t line two \n");
        assert_eq!(cleaned, "line one\nline two");
    }

    #[test]
    fn test_categorization_prompt_lists_all_categories() {
        let prompt = categorization_prompt(&record());
        for category in Category::ALL {
            assert!(prompt.contains(category.label()), "{}", category.label());
        }
        assert!(prompt.ends_with("Category:"));
    }

    #[test]
    fn test_prompts_include_commit_details() {
        for prompt in [
            categorization_prompt(&record()),
            general_summary_prompt(&record()),
            technical_summary_prompt(&record()),
        ] {
            assert!(prompt.contains("abc12345"));
            assert!(prompt.contains("Fix overflow in lexer."));
            assert!(prompt.contains("lexer.c"));
        }
    }

    #[test]
    fn test_diff_snippet_truncated() {
        let mut r = record();
        r.diffs
            .insert("big.c".to_string(), "+x".repeat(DIFF_SNIPPET_MAX));
        let prompt = general_summary_prompt(&r);
        assert!(prompt.len() < 2 * DIFF_SNIPPET_MAX + 4_000);
    }

    #[test]
    fn test_with_retrieved_context() {
        let docs = vec![ScoredDocument {
            id: "0".to_string(),
            text: "Earlier summary text.".to_string(),
            score: 0.9,
            metadata: None,
        }];
        let prompt = with_retrieved_context("Base prompt", &docs);
        assert!(prompt.contains("Previous similar commits:"));
        assert!(prompt.contains("Earlier summary text."));

        assert_eq!(with_retrieved_context("Base prompt", &[]), "Base prompt");
    }
}

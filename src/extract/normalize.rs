//! Message Normalizer
//!
//! Canonicalizes free-text commit messages through a fixed transform chain:
//! whitespace and punctuation collapsing, filler-phrase removal, verb-form
//! canonicalization, capitalization, and a terminal period.
//!
//! The chain is applied to a fixpoint, so `normalize(normalize(m)) ==
//! normalize(m)` holds even when one removal uncovers another (e.g. a filler
//! phrase assembled by an earlier substitution).

use std::sync::LazyLock;

use regex::Regex;

use crate::types::CheckpointSet;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

static PUNCT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[!?.]{2,}").expect("static regex"));

/// Filler phrases stripped from messages, case-insensitive and word-bounded.
const FILLER_PHRASES: &[&str] = &[
    r"(?i)\bthis commit\b",
    r"(?i)\bminor fix\b",
    r"(?i)\bsmall update\b",
    r"(?i)\bquick fix\b",
    r"(?i)\btemporary change\b",
    r"(?i)\btest commit\b",
];

/// Verb and keyword canonicalizations, case-insensitive and word-bounded.
const CANONICAL_FORMS: &[(&str, &str)] = &[
    (r"(?i)\badded\b", "Add"),
    (r"(?i)\bremoved\b", "Remove"),
    (r"(?i)\bfixed\b", "Fix"),
    (r"(?i)\bbugfix\b", "Bug fix"),
    (r"(?i)\brefactored\b", "Refactor"),
];

static FILLERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FILLER_PHRASES
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
});

static CANONICAL: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    CANONICAL_FORMS
        .iter()
        .map(|(p, r)| (Regex::new(p).expect("static regex"), *r))
        .collect()
});

/// Upper bound on fixpoint iterations. Real messages converge in one or two
/// passes; the cap only guards against pathological inputs.
const MAX_PASSES: usize = 64;

/// Normalize a single commit message. Idempotent.
pub fn normalize_message(message: &str) -> String {
    let mut current = message.to_string();
    for _ in 0..MAX_PASSES {
        let next = normalize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_pass(message: &str) -> String {
    let mut text = message.trim().to_string();

    // Collapse whitespace runs to a single space
    text = WHITESPACE_RUN.replace_all(&text, " ").trim().to_string();

    // Strip filler phrases, then re-collapse the gaps they leave
    for filler in FILLERS.iter() {
        text = filler.replace_all(&text, "").trim().to_string();
    }
    text = WHITESPACE_RUN.replace_all(&text, " ").trim().to_string();

    // Collapse repeated punctuation like "!!!" or "..." to a single period
    text = PUNCT_RUN.replace_all(&text, ".").to_string();

    // Canonicalize verb forms
    for (pattern, replacement) in CANONICAL.iter() {
        text = pattern.replace_all(&text, *replacement).to_string();
    }

    text = capitalize(&text);
    ensure_terminal_period(text)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn ensure_terminal_period(mut text: String) -> String {
    match text.chars().last() {
        Some('!') | Some('?') => {
            text.pop();
            text.push('.');
        }
        Some('.') => {}
        _ => text.push('.'),
    }
    text
}

/// Normalize every record's message in place.
pub fn normalize_set(set: &mut CheckpointSet) {
    for record in set.values_mut() {
        record.message = normalize_message(&record.message);
    }
    tracing::info!("Normalized commit messages");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize_message("Fix   the \t lexer"), "Fix the lexer.");
    }

    #[test]
    fn test_repeated_punctuation_collapsed() {
        assert_eq!(normalize_message("Works now!!!"), "Works now.");
        assert_eq!(normalize_message("Really...???"), "Really.");
    }

    #[test]
    fn test_filler_phrases_stripped() {
        assert_eq!(
            normalize_message("This commit adds bounds checks"),
            "Adds bounds checks."
        );
        assert_eq!(normalize_message("Quick fix for parser"), "For parser.");
    }

    #[test]
    fn test_verb_forms_canonicalized() {
        assert_eq!(normalize_message("Added new opcode"), "Add new opcode.");
        assert_eq!(normalize_message("removed dead code"), "Remove dead code.");
        assert_eq!(normalize_message("fixed overflow"), "Fix overflow.");
        assert_eq!(normalize_message("Bugfix in gc"), "Bug fix in gc.");
        assert_eq!(
            normalize_message("Refactored the allocator"),
            "Refactor the allocator."
        );
    }

    #[test]
    fn test_capitalized_and_terminated() {
        assert_eq!(normalize_message("support utf8"), "Support utf8.");
        assert_eq!(normalize_message("support utf8."), "Support utf8.");
        assert_eq!(normalize_message("done?"), "Done.");
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(normalize_message(""), ".");
        assert_eq!(normalize_message("   "), ".");
    }

    #[test]
    fn test_substitution_uncovering_a_filler_is_still_idempotent() {
        // "quick Fixed" becomes "quick Fix" which is itself a filler phrase;
        // the fixpoint loop strips it in the same call.
        let once = normalize_message("quick Fixed the build");
        assert_eq!(normalize_message(&once), once);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(message in ".{0,200}") {
            let once = normalize_message(&message);
            let twice = normalize_message(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_idempotent_on_phrase_dense_input(
            message in "(this commit|quick fix|Fixed|Added|Bugfix|commit| |!|\\?|\\.){0,10}"
        ) {
            let once = normalize_message(&message);
            let twice = normalize_message(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_output_ends_with_period(message in ".{0,80}") {
            prop_assert!(normalize_message(&message).ends_with('.'));
        }
    }
}

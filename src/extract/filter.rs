//! Trivial-Commit Filter
//!
//! Drops commits whose message matches a low-value pattern or whose total
//! diff is below a size threshold, then renumbers the survivors densely
//! from 0 so downstream indices stay contiguous.

use regex::RegexBuilder;
use tracing::info;

use crate::types::{CheckpointSet, CommitRecord, LoreError, Result};

/// Default low-value message patterns, matched case-insensitively.
pub const DEFAULT_TRIVIAL_PATTERNS: &[&str] = &[
    "merge branch",
    "fix typo",
    "readme",
    "minor",
    "release",
    "cleanup",
];

/// Default minimum total changed-line count for a commit to survive.
pub const DEFAULT_MIN_DIFF_LINES: usize = 5;

pub struct TrivialCommitFilter {
    patterns: Vec<regex::Regex>,
    min_diff_lines: usize,
}

impl TrivialCommitFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S], min_diff_lines: usize) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        LoreError::Config(format!("Invalid filter pattern '{}': {}", p.as_ref(), e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            min_diff_lines,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_TRIVIAL_PATTERNS, DEFAULT_MIN_DIFF_LINES)
    }

    fn is_trivial(&self, record: &CommitRecord) -> bool {
        if self.patterns.iter().any(|p| p.is_match(&record.message)) {
            return true;
        }
        record.total_diff_lines() < self.min_diff_lines
    }

    /// Remove trivial records and renumber the survivors densely from 0,
    /// preserving relative order. The removed count is reported via the log,
    /// not the return value.
    pub fn apply(&self, set: CheckpointSet) -> CheckpointSet {
        let before = set.len();
        let kept: CheckpointSet = set
            .iter()
            .filter(|(_, record)| !self.is_trivial(record))
            .map(|(idx, record)| (idx, record.clone()))
            .collect();
        let filtered = kept.renumbered();

        info!("Filtered {} commits", before - filtered.len());
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommitRecord;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn record(message: &str, diff_lines: usize) -> CommitRecord {
        let diff = (0..diff_lines)
            .map(|i| format!("+line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let mut diffs = BTreeMap::new();
        if diff_lines > 0 {
            diffs.insert("file.c".to_string(), diff);
        }
        CommitRecord {
            hash: "deadbeef".to_string(),
            author: "A <a@example.com>".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: message.to_string(),
            files_changed: vec!["file.c".to_string()],
            diffs,
            category: None,
            general_summary: None,
            technical_summary: None,
        }
    }

    fn set_of(records: Vec<CommitRecord>) -> CheckpointSet {
        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| (i as u32, r))
            .collect()
    }

    #[test]
    fn test_merge_commit_removed_regardless_of_size() {
        let filter = TrivialCommitFilter::with_defaults().unwrap();
        let set = set_of(vec![record("Merge branch 'x'", 100)]);
        assert_eq!(filter.apply(set).len(), 0);
    }

    #[test]
    fn test_small_diff_removed_large_kept() {
        let filter = TrivialCommitFilter::with_defaults().unwrap();

        let small = set_of(vec![record("Implement feature", 3)]);
        assert_eq!(filter.apply(small).len(), 0);

        let large = set_of(vec![record("Implement feature", 6)]);
        assert_eq!(filter.apply(large).len(), 1);
    }

    #[test]
    fn test_pattern_match_is_case_insensitive() {
        let filter = TrivialCommitFilter::with_defaults().unwrap();
        let set = set_of(vec![record("FIX TYPO in docs", 50)]);
        assert_eq!(filter.apply(set).len(), 0);
    }

    #[test]
    fn test_survivors_renumbered_densely() {
        let filter = TrivialCommitFilter::with_defaults().unwrap();
        let mut records = Vec::new();
        for i in 0..10 {
            // Records 1, 3, and 5 are trivially small
            let lines = if matches!(i, 1 | 3 | 5) { 2 } else { 10 };
            records.push(record(&format!("Implement feature {}", i), lines));
        }
        // Record 7 is a merge, leaving 6 of 10
        records[7].message = "Merge branch 'dev'".to_string();

        let filtered = filter.apply(set_of(records));
        assert_eq!(filtered.len(), 6);
        assert_eq!(filtered.indices(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(filtered.get(0).unwrap().message, "Implement feature 0");
        assert_eq!(filtered.get(1).unwrap().message, "Implement feature 2");
        assert_eq!(filtered.get(5).unwrap().message, "Implement feature 9");
    }

    #[test]
    fn test_order_preserved() {
        let filter = TrivialCommitFilter::with_defaults().unwrap();
        let set = set_of(vec![
            record("Implement parser", 10),
            record("fix typo", 10),
            record("Implement lexer", 10),
        ]);
        let filtered = filter.apply(set);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.get(0).unwrap().message, "Implement parser");
        assert_eq!(filtered.get(1).unwrap().message, "Implement lexer");
    }
}

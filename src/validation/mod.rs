//! Categorization Validation
//!
//! Scores predicted categories against a hand-labeled sample covering the
//! tail of the working set. `Other` is treated as the negative class:
//! a correct `Other` is a true negative, a wrong `Other` a false negative,
//! and any other mismatch (including a missing prediction) a false positive.

use std::path::Path;

use crate::types::{Category, CheckpointSet, LoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorizationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub accuracy: f64,
    /// Number of labeled records scored
    pub evaluated: usize,
}

/// Load ground-truth labels: one category label per line, oldest labeled
/// commit first. Blank lines and `#` comments are skipped.
pub fn load_ground_truth<P: AsRef<Path>>(path: P) -> Result<Vec<Category>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.parse::<Category>()
                .map_err(LoreError::Validation)
        })
        .collect()
}

/// Score the last `ground_truth.len()` records of the set, in ascending
/// sequence order, against the labels.
pub fn score_categorization(
    set: &CheckpointSet,
    ground_truth: &[Category],
) -> Result<CategorizationMetrics> {
    if ground_truth.is_empty() {
        return Err(LoreError::Validation(
            "Ground-truth label set is empty".to_string(),
        ));
    }
    if ground_truth.len() > set.len() {
        return Err(LoreError::Validation(format!(
            "{} labels but only {} records",
            ground_truth.len(),
            set.len()
        )));
    }

    let skip = set.len() - ground_truth.len();

    let mut tp = 0u32;
    let mut tn = 0u32;
    let mut fp = 0u32;
    let mut fn_ = 0u32;

    for (position, (_, record)) in set.iter().enumerate().skip(skip) {
        let actual = ground_truth[position - skip];
        match record.category {
            Some(predicted) if predicted == actual => {
                if actual == Category::Other {
                    tn += 1;
                } else {
                    tp += 1;
                }
            }
            Some(Category::Other) => fn_ += 1,
            // Wrong label, or nothing predicted at all
            _ => fp += 1,
        }
    }

    let evaluated = (tp + tn + fp + fn_) as usize;
    let accuracy = f64::from(tp + tn) / evaluated as f64;
    let precision = if tp + fp > 0 {
        f64::from(tp) / f64::from(tp + fp)
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        f64::from(tp) / f64::from(tp + fn_)
    } else {
        0.0
    };

    Ok(CategorizationMetrics {
        precision,
        recall,
        accuracy,
        evaluated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommitRecord;
    use chrono::DateTime;
    use std::collections::BTreeMap;

    fn record_with_category(category: Option<Category>) -> CommitRecord {
        CommitRecord {
            hash: "h".to_string(),
            author: "A <a@example.com>".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: "Fix parser.".to_string(),
            files_changed: vec![],
            diffs: BTreeMap::new(),
            category,
            general_summary: None,
            technical_summary: None,
        }
    }

    fn set_of(categories: Vec<Option<Category>>) -> CheckpointSet {
        categories
            .into_iter()
            .enumerate()
            .map(|(i, c)| (i as u32, record_with_category(c)))
            .collect()
    }

    #[test]
    fn test_perfect_predictions() {
        let set = set_of(vec![
            Some(Category::BugFix),
            Some(Category::FeatureUpdate),
            Some(Category::Other),
        ]);
        let truth = vec![Category::BugFix, Category::FeatureUpdate, Category::Other];

        let metrics = score_categorization(&set, &truth).unwrap();
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.evaluated, 3);
    }

    #[test]
    fn test_only_labeled_tail_is_scored() {
        // 4 records, 2 labels: only the last two are scored
        let set = set_of(vec![
            Some(Category::StyleUpdate),
            Some(Category::StyleUpdate),
            Some(Category::BugFix),
            Some(Category::Refactoring),
        ]);
        let truth = vec![Category::BugFix, Category::Refactoring];

        let metrics = score_categorization(&set, &truth).unwrap();
        assert_eq!(metrics.evaluated, 2);
        assert_eq!(metrics.accuracy, 1.0);
    }

    #[test]
    fn test_mixed_confusion_counts() {
        let set = set_of(vec![
            Some(Category::BugFix),      // tp
            Some(Category::Other),       // vs FeatureUpdate: fn
            Some(Category::Refactoring), // vs BugFix: fp
            None,                        // vs BugFix: fp
        ]);
        let truth = vec![
            Category::BugFix,
            Category::FeatureUpdate,
            Category::BugFix,
            Category::BugFix,
        ];

        let metrics = score_categorization(&set, &truth).unwrap();
        // tp=1 tn=0 fp=2 fn=1
        assert!((metrics.accuracy - 0.25).abs() < 1e-9);
        assert!((metrics.precision - 1.0 / 3.0).abs() < 1e-9);
        assert!((metrics.recall - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_more_labels_than_records_is_error() {
        let set = set_of(vec![Some(Category::BugFix)]);
        let truth = vec![Category::BugFix, Category::Other];
        assert!(score_categorization(&set, &truth).is_err());
    }

    #[test]
    fn test_load_ground_truth() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "# labeled tail, oldest first\nBug Fix\n\nFeature Update\n").unwrap();

        let labels = load_ground_truth(&path).unwrap();
        assert_eq!(labels, vec![Category::BugFix, Category::FeatureUpdate]);
    }

    #[test]
    fn test_load_ground_truth_rejects_unknown_label() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "Not A Category\n").unwrap();
        assert!(load_ground_truth(&path).is_err());
    }
}

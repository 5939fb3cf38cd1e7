//! Commit Record Types
//!
//! Fixed-schema record types for the mining pipeline. A `CommitRecord` is
//! created once by the extractor and only ever grows: the normalizer rewrites
//! the message exactly once, and the enrichment driver fills each enrichment
//! field at most once (empty fields are recomputed on resume, populated
//! fields are never touched again).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed category taxonomy for commit classification.
///
/// Serialized as the human-readable label so checkpoints, database rows, and
/// index metadata all carry the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Feature Update")]
    FeatureUpdate,
    #[serde(rename = "Bug Fix")]
    BugFix,
    #[serde(rename = "Documentation Update")]
    DocumentationUpdate,
    #[serde(rename = "Refactoring")]
    Refactoring,
    #[serde(rename = "Performance Improvement")]
    PerformanceImprovement,
    #[serde(rename = "Test Addition/Update")]
    TestAdditionUpdate,
    #[serde(rename = "Dependency Update")]
    DependencyUpdate,
    #[serde(rename = "Build/CI Change")]
    BuildCiChange,
    #[serde(rename = "Style Update")]
    StyleUpdate,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    /// All categories in prompt order.
    pub const ALL: [Category; 10] = [
        Category::FeatureUpdate,
        Category::BugFix,
        Category::DocumentationUpdate,
        Category::Refactoring,
        Category::PerformanceImprovement,
        Category::TestAdditionUpdate,
        Category::DependencyUpdate,
        Category::BuildCiChange,
        Category::StyleUpdate,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::FeatureUpdate => "Feature Update",
            Category::BugFix => "Bug Fix",
            Category::DocumentationUpdate => "Documentation Update",
            Category::Refactoring => "Refactoring",
            Category::PerformanceImprovement => "Performance Improvement",
            Category::TestAdditionUpdate => "Test Addition/Update",
            Category::DependencyUpdate => "Dependency Update",
            Category::BuildCiChange => "Build/CI Change",
            Category::StyleUpdate => "Style Update",
            Category::Other => "Other",
        }
    }

    /// Map free-text model output onto the nearest known label.
    ///
    /// Case-insensitive substring match against the label set; anything the
    /// model produces that contains no known label maps to `Other`.
    pub fn from_model_output(answer: &str) -> Category {
        let lower = answer.to_lowercase();
        for category in Category::ALL {
            if category != Category::Other && lower.contains(&category.label().to_lowercase()) {
                return category;
            }
        }
        Category::Other
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Unknown category label: {}", trimmed))
    }
}

/// Which summary flavor a document or search is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    General,
    Technical,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::General => "general",
            SummaryKind::Technical => "technical",
        }
    }
}

impl std::fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One commit as mined from the repository, plus its enrichment fields.
///
/// Diffs are keyed by file path (renames keyed `"old -> new"`), with values
/// already reduced to added/removed content lines. A `BTreeMap` keeps
/// serialization deterministic so identical sets produce identical
/// checkpoint bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub files_changed: Vec<String>,
    pub diffs: BTreeMap<String, String>,

    /// Enrichment fields. Each is independently nullable and written at most
    /// once per field by the driver.
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub general_summary: Option<String>,
    #[serde(default)]
    pub technical_summary: Option<String>,
}

impl CommitRecord {
    /// Total changed-line count across all file diffs.
    pub fn total_diff_lines(&self) -> usize {
        self.diffs.values().map(|d| d.lines().count()).sum()
    }

    /// Short hash for progress output.
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }

    /// True once all three enrichment fields are populated.
    pub fn fully_enriched(&self) -> bool {
        self.category.is_some()
            && self.general_summary.is_some()
            && self.technical_summary.is_some()
    }
}

/// Ordered map from `sequence_index` to record: the unit of checkpointing.
///
/// Iteration order is ascending by index, which is also the processing order
/// of the enrichment driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointSet {
    records: BTreeMap<u32, CommitRecord>,
}

impl CheckpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u32, record: CommitRecord) {
        self.records.insert(index, record);
    }

    pub fn get(&self, index: u32) -> Option<&CommitRecord> {
        self.records.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut CommitRecord> {
        self.records.get_mut(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &CommitRecord)> {
        self.records.iter().map(|(idx, record)| (*idx, record))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut CommitRecord> {
        self.records.values_mut()
    }

    /// Indices in processing order. Collected up front so the driver can
    /// mutate records while walking the set.
    pub fn indices(&self) -> Vec<u32> {
        self.records.keys().copied().collect()
    }

    /// Rebuild with dense indices `0..n`, preserving relative order.
    pub fn renumbered(self) -> Self {
        let records = self
            .records
            .into_values()
            .enumerate()
            .map(|(i, record)| (i as u32, record))
            .collect();
        Self { records }
    }

    /// Count of records for which `field` returns a populated value.
    pub fn count_populated<F>(&self, field: F) -> usize
    where
        F: Fn(&CommitRecord) -> bool,
    {
        self.records.values().filter(|r| field(r)).count()
    }

    /// Per-category record counts, for the status report.
    pub fn category_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records.values() {
            if let Some(category) = record.category {
                *counts.entry(category.label()).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl FromIterator<(u32, CommitRecord)> for CheckpointSet {
    fn from_iter<I: IntoIterator<Item = (u32, CommitRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

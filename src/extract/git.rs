//! Commit Extractor
//!
//! Walks a repository's history oldest-first and produces one `CommitRecord`
//! per commit, with diffs reduced to added/removed content lines.
//!
//! Diffs are computed against the first parent (an empty tree for root
//! commits), so a merge commit contributes exactly its delta versus the
//! branch it landed on - no synthesis across parents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use git2::{Diff, DiffDelta, DiffFormat, DiffOptions, Repository, Sort};
use tracing::{debug, info};

use crate::types::{CheckpointSet, CommitRecord, LoreError, Result};

pub struct CommitExtractor {
    repo_path: PathBuf,
    branch: Option<String>,
}

impl CommitExtractor {
    pub fn new<P: AsRef<Path>>(repo_path: P, branch: Option<String>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            branch,
        }
    }

    /// Extract the full history as a `CheckpointSet`.
    ///
    /// Records are ordered oldest-first with `sequence_index` assigned as the
    /// 0-based position in that order. Any failure here is fatal: either the
    /// whole history is extracted or nothing is returned.
    pub fn extract(&self) -> Result<CheckpointSet> {
        let repo = Repository::open(&self.repo_path).map_err(|e| {
            LoreError::extraction(self.repo_path.display().to_string(), e.message().to_string())
        })?;

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME | Sort::REVERSE)?;

        match &self.branch {
            Some(branch) => {
                let reference = repo.resolve_reference_from_short_name(branch).map_err(|e| {
                    LoreError::extraction(
                        self.repo_path.display().to_string(),
                        format!("branch '{}': {}", branch, e.message()),
                    )
                })?;
                let target = reference.target().ok_or_else(|| {
                    LoreError::extraction(
                        self.repo_path.display().to_string(),
                        format!("branch '{}' has no direct target", branch),
                    )
                })?;
                revwalk.push(target)?;
            }
            None => revwalk.push_head().map_err(|e| {
                LoreError::extraction(self.repo_path.display().to_string(), e.message().to_string())
            })?,
        }

        let mut set = CheckpointSet::new();

        for (index, oid) in revwalk.enumerate() {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;

            let author = commit.author();
            let author_str = format!(
                "{} <{}>",
                author.name().unwrap_or("unknown"),
                author.email().unwrap_or("")
            );
            let timestamp = DateTime::from_timestamp(commit.time().seconds(), 0)
                .unwrap_or(DateTime::UNIX_EPOCH);
            let message = commit.message().unwrap_or("").trim().to_string();

            let diff = self.first_parent_diff(&repo, &commit)?;
            let files_changed = changed_files(&diff);
            let diffs = content_line_diffs(&diff)?;

            debug!(index, hash = %oid, files = files_changed.len(), "extracted commit");

            set.insert(
                index as u32,
                CommitRecord {
                    hash: oid.to_string(),
                    author: author_str,
                    timestamp,
                    message,
                    files_changed,
                    diffs,
                    category: None,
                    general_summary: None,
                    technical_summary: None,
                },
            );
        }

        info!("Extracted {} commits", set.len());
        Ok(set)
    }

    /// Diff versus the first parent, or versus the empty tree for a root
    /// commit.
    fn first_parent_diff<'r>(
        &self,
        repo: &'r Repository,
        commit: &git2::Commit<'_>,
    ) -> Result<Diff<'r>> {
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let tree = commit.tree()?;

        let mut opts = DiffOptions::new();
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        Ok(diff)
    }
}

/// File label for a delta: plain path, or `"old -> new"` for renames.
fn delta_name(delta: &DiffDelta<'_>) -> String {
    let old = delta.old_file().path().map(|p| p.display().to_string());
    let new = delta.new_file().path().map(|p| p.display().to_string());
    match (old, new) {
        (Some(old), Some(new)) if old != new => format!("{} -> {}", old, new),
        (_, Some(new)) => new,
        (Some(old), None) => old,
        (None, None) => String::new(),
    }
}

fn changed_files(diff: &Diff<'_>) -> Vec<String> {
    diff.deltas().map(|delta| delta_name(&delta)).collect()
}

/// Collect per-file diff text keeping only `+`/`-` content lines.
///
/// `DiffFormat::Patch` tags file and hunk headers with their own origin
/// characters, so filtering on the line origin drops them without any
/// string matching on `+++`/`---`.
fn content_line_diffs(diff: &Diff<'_>) -> Result<BTreeMap<String, String>> {
    let mut diffs: BTreeMap<String, String> = BTreeMap::new();

    diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        match line.origin() {
            '+' | '-' => {
                let text = String::from_utf8_lossy(line.content());
                let entry = diffs.entry(delta_name(&delta)).or_default();
                if !entry.is_empty() {
                    entry.push('\n');
                }
                entry.push(line.origin());
                entry.push_str(text.trim_end_matches('\n'));
            }
            _ => {}
        }
        true
    })?;

    Ok(diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = git2::Signature::now("Tester", "tester@example.com").unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_extract_orders_oldest_first() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "one\n", "First commit");
        commit_file(&repo, "a.txt", "one\ntwo\n", "Second commit");
        commit_file(&repo, "b.txt", "three\n", "Third commit");

        let set = CommitExtractor::new(dir.path(), None).extract().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(0).unwrap().message, "First commit");
        assert_eq!(set.get(2).unwrap().message, "Third commit");
    }

    #[test]
    fn test_root_commit_diffs_against_empty_tree() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "alpha\nbeta\n", "First commit");

        let set = CommitExtractor::new(dir.path(), None).extract().unwrap();
        let root = set.get(0).unwrap();
        let diff = root.diffs.get("a.txt").unwrap();
        assert_eq!(diff, "+alpha\n+beta");
    }

    #[test]
    fn test_diff_keeps_only_content_lines() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "one\ntwo\n", "First commit");
        commit_file(&repo, "a.txt", "one\nTWO\n", "Second commit");

        let set = CommitExtractor::new(dir.path(), None).extract().unwrap();
        let diff = set.get(1).unwrap().diffs.get("a.txt").unwrap().clone();
        for line in diff.lines() {
            assert!(line.starts_with('+') || line.starts_with('-'));
            assert!(!line.starts_with("+++"));
            assert!(!line.starts_with("---"));
        }
        assert!(diff.contains("-two"));
        assert!(diff.contains("+TWO"));
    }

    #[test]
    fn test_invalid_repository_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = CommitExtractor::new(dir.path().join("nope"), None)
            .extract()
            .unwrap_err();
        assert!(matches!(err, LoreError::Extraction { .. }));
    }
}

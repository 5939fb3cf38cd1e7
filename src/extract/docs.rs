//! Documentation Scanner
//!
//! Walks the mined repository for documentation files to feed the
//! general-docs collection of the document index.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};

use crate::types::Result;

/// Extensions considered documentation.
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt", "adoc"];

/// Default maximum documentation file size (1MB)
const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

/// One documentation file ready for indexing.
#[derive(Debug, Clone)]
pub struct DocFile {
    /// Path relative to the scan root
    pub relative_path: String,
    pub content: String,
    /// Content-derived id, stable across rescans of unchanged files
    pub id: String,
}

pub struct DocScanner {
    root: PathBuf,
    max_file_size: u64,
}

impl DocScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn scan(&self) -> Result<Vec<DocFile>> {
        let mut docs = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .build();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || !is_doc_file(path) {
                continue;
            }
            if let Ok(meta) = path.metadata()
                && meta.len() > self.max_file_size
            {
                continue;
            }

            let Ok(content) = std::fs::read_to_string(path) else {
                // Non-UTF8 files are skipped, not fatal
                continue;
            };

            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            let mut hasher = Sha256::new();
            hasher.update(relative_path.as_bytes());
            hasher.update(content.as_bytes());
            let id = format!("{:x}", hasher.finalize());

            docs.push(DocFile {
                relative_path,
                content,
                id,
            });
        }

        docs.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(docs)
    }
}

fn is_doc_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| DOC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_finds_doc_files_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Title\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "notes\n").unwrap();
        fs::write(dir.path().join("main.c"), "int main;\n").unwrap();

        let docs = DocScanner::new(dir.path()).scan().unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.relative_path.as_str()).collect();
        assert_eq!(names, vec!["README.md", "notes.txt"]);
    }

    #[test]
    fn test_id_stable_for_unchanged_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Title\n").unwrap();

        let first = DocScanner::new(dir.path()).scan().unwrap();
        let second = DocScanner::new(dir.path()).scan().unwrap();
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn test_oversized_files_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.md"), "x".repeat(64)).unwrap();

        let docs = DocScanner::new(dir.path())
            .with_max_file_size(16)
            .scan()
            .unwrap();
        assert!(docs.is_empty());
    }
}

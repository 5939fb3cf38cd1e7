//! Checkpoint Store
//!
//! Full-snapshot persistence of a `CheckpointSet` with integrity checking.
//!
//! Each checkpoint is a JSON envelope carrying a schema version and a CRC32
//! checksum over the serialized records. Saves are unconditional full
//! replacements (temp file + rename); loads return `None` for a missing file
//! and fail hard on anything corrupt - a checkpoint that cannot be trusted
//! must not silently seed a run.
//!
//! Two named checkpoints exist per pipeline: `raw`, written once after
//! extraction+filter+normalization, and one per experiment, rewritten after
//! every enriched record.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{CheckpointSet, LoreError, Result};

/// Current checkpoint schema version.
///
/// Increment when making breaking changes to the envelope or record layout.
pub const CHECKPOINT_VERSION: u8 = 1;

/// Checkpoint name for the immutable post-extraction set.
pub const RAW_CHECKPOINT: &str = "raw";

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointEnvelope {
    version: u8,
    saved_at: String,
    /// CRC32 over the serialized `records` value
    checksum: u32,
    records: CheckpointSet,
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("commits_{}.json", name))
    }

    /// Serialize a set into envelope bytes, ready for [`write_encoded`].
    ///
    /// Encoding happens on the caller's thread so the snapshot is consistent
    /// even when the write itself is dispatched to a worker.
    pub fn encode(set: &CheckpointSet) -> Result<Vec<u8>> {
        let records_bytes = serde_json::to_vec(set)?;
        let checksum = crc32fast::hash(&records_bytes);

        let envelope = CheckpointEnvelope {
            version: CHECKPOINT_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            checksum,
            records: set.clone(),
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    /// Write pre-encoded envelope bytes to `path`, creating parent
    /// directories and fully replacing any previous file.
    pub fn write_encoded(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn save(&self, name: &str, set: &CheckpointSet) -> Result<()> {
        let path = self.path_for(name);
        let bytes = Self::encode(set)?;
        Self::write_encoded(&path, &bytes)?;
        tracing::debug!(checkpoint = name, records = set.len(), "checkpoint saved");
        Ok(())
    }

    /// Load a named checkpoint. `Ok(None)` when the file does not exist;
    /// corrupt content is fatal.
    pub fn load(&self, name: &str) -> Result<Option<CheckpointSet>> {
        let path = self.path_for(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let display = path.display().to_string();
        let envelope: CheckpointEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| LoreError::checkpoint(&display, e.to_string()))?;

        if envelope.version != CHECKPOINT_VERSION {
            return Err(LoreError::checkpoint(
                &display,
                format!(
                    "schema version {} (expected {})",
                    envelope.version, CHECKPOINT_VERSION
                ),
            ));
        }

        let records_bytes = serde_json::to_vec(&envelope.records)?;
        let checksum = crc32fast::hash(&records_bytes);
        if checksum != envelope.checksum {
            return Err(LoreError::checkpoint(
                &display,
                format!(
                    "checksum mismatch: stored {:08x}, computed {:08x}",
                    envelope.checksum, checksum
                ),
            ));
        }

        Ok(Some(envelope.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommitRecord;
    use chrono::DateTime;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_set() -> CheckpointSet {
        let record = CommitRecord {
            hash: "cafebabe".to_string(),
            author: "A <a@example.com>".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: "Add interpreter loop.".to_string(),
            files_changed: vec!["vm.c".to_string()],
            diffs: BTreeMap::from([("vm.c".to_string(), "+loop();".to_string())]),
            category: None,
            general_summary: None,
            technical_summary: None,
        };
        let mut set = CheckpointSet::new();
        set.insert(0, record);
        set
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let set = sample_set();

        store.save(RAW_CHECKPOINT, &set).unwrap();
        let loaded = store.load(RAW_CHECKPOINT).unwrap().unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_missing_file_is_none_not_error() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("absent").unwrap().is_none());
    }

    #[test]
    fn test_save_creates_intermediate_directories() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("a/b/c"));
        store.save("exp1", &sample_set()).unwrap();
        assert!(store.path_for("exp1").exists());
    }

    #[test]
    fn test_overwrite_replaces_previous_content() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        let mut set = sample_set();
        store.save("exp1", &set).unwrap();

        set.get_mut(0).unwrap().general_summary = Some("A summary.".to_string());
        store.save("exp1", &set).unwrap();

        let loaded = store.load("exp1").unwrap().unwrap();
        assert_eq!(
            loaded.get(0).unwrap().general_summary.as_deref(),
            Some("A summary.")
        );
    }

    #[test]
    fn test_corrupt_json_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(store.path_for("bad"), b"{ not json").unwrap();

        let err = store.load("bad").unwrap_err();
        assert!(matches!(err, LoreError::Checkpoint { .. }));
    }

    #[test]
    fn test_tampered_records_fail_checksum() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save("exp1", &sample_set()).unwrap();

        let path = store.path_for("exp1");
        let text = std::fs::read_to_string(&path)
            .unwrap()
            .replace("Add interpreter loop.", "Add interpreter hook.");
        std::fs::write(&path, text).unwrap();

        let err = store.load("exp1").unwrap_err();
        assert!(matches!(err, LoreError::Checkpoint { .. }));
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save("exp1", &sample_set()).unwrap();

        let path = store.path_for("exp1");
        let text = std::fs::read_to_string(&path)
            .unwrap()
            .replacen("\"version\": 1", "\"version\": 9", 1);
        std::fs::write(&path, text).unwrap();

        let err = store.load("exp1").unwrap_err();
        assert!(matches!(err, LoreError::Checkpoint { .. }));
    }
}

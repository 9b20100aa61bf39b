//! Activity Memory - Append-Only Cycle History
//!
//! `TigerStyle`: Graceful degradation — a corrupt memory store never blocks
//! a cycle, and the engine never rewrites or truncates what is already on
//! disk.
//!
//! One JSON record per line (JSON Lines). Appending a record touches only
//! the end of the file; prior records are immutable. Pruning, if any, is an
//! administrative concern outside this crate.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{MEMORY_RECORD_BYTES_MAX, MEMORY_SUMMARY_BYTES_MAX};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from memory append operations.
///
/// Load corruption is deliberately NOT here: an unreadable history degrades
/// to an empty one (the file is preserved for human inspection).
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The record could not be serialised.
    #[error("memory record serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The store could not be written.
    #[error("memory store write failed: {path}: {source}")]
    Io {
        /// Store path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The record exceeds the single-record size limit.
    #[error("memory record too large: {len} bytes (max {max})")]
    RecordTooLarge {
        /// Actual length
        len: usize,
        /// Maximum allowed
        max: usize,
    },
}

// =============================================================================
// MemoryRecord
// =============================================================================

/// One entry per completed cycle. Append-only; never edited retroactively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// When the cycle completed.
    pub recorded_at: DateTime<Utc>,
    /// Unique id of the cycle that produced this record.
    pub cycle_id: Uuid,
    /// Ids of sections whose content actually changed (may be fewer than
    /// were selected, per the generation-failure skip policy).
    pub sections_touched: Vec<String>,
    /// One-line summary of the cycle.
    pub summary: String,
    /// File names of operator messages consumed this cycle.
    pub messages_consumed: Vec<String>,
    /// Content digests of every section after the cycle, keyed by id.
    #[serde(default)]
    pub section_hashes: BTreeMap<String, String>,
}

impl MemoryRecord {
    /// Create a record for the just-completed cycle.
    ///
    /// The summary is truncated to `MEMORY_SUMMARY_BYTES_MAX` on a char
    /// boundary.
    #[must_use]
    pub fn new(
        summary: impl Into<String>,
        sections_touched: Vec<String>,
        messages_consumed: Vec<String>,
    ) -> Self {
        let mut summary = summary.into();
        if summary.len() > MEMORY_SUMMARY_BYTES_MAX {
            let mut cut = MEMORY_SUMMARY_BYTES_MAX;
            while !summary.is_char_boundary(cut) {
                cut -= 1;
            }
            summary.truncate(cut);
            summary.push_str("...");
        }

        Self {
            recorded_at: Utc::now(),
            cycle_id: Uuid::new_v4(),
            sections_touched,
            summary,
            messages_consumed,
            section_hashes: BTreeMap::new(),
        }
    }

    /// Attach the post-cycle section digests.
    #[must_use]
    pub fn with_section_hashes(mut self, hashes: BTreeMap<String, String>) -> Self {
        self.section_hashes = hashes;
        self
    }
}

// =============================================================================
// ActivityMemory
// =============================================================================

/// The append-only store of past wake cycles.
#[derive(Debug, Clone)]
pub struct ActivityMemory {
    path: PathBuf,
}

impl ActivityMemory {
    /// Create a handle for the store at `path`. No I/O happens here.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full history, oldest first.
    ///
    /// First run (no file) is a valid empty history. Unparsable lines are
    /// skipped with a warning; an unreadable file degrades to an empty
    /// history. The file on disk is never modified by loading.
    #[must_use]
    pub fn load(&self) -> Vec<MemoryRecord> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "memory store unreadable, proceeding with empty history"
                );
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %e,
                        "skipping corrupt memory record"
                    );
                }
            }
        }
        records
    }

    /// Append one record. Never rewrites or truncates prior records.
    ///
    /// # Errors
    /// [`MemoryError`] when the record cannot be serialised or the store
    /// cannot be written.
    pub fn append(&self, record: &MemoryRecord) -> Result<(), MemoryError> {
        let line = serde_json::to_string(record)?;
        if line.len() > MEMORY_RECORD_BYTES_MAX {
            return Err(MemoryError::RecordTooLarge {
                len: line.len(),
                max: MEMORY_RECORD_BYTES_MAX,
            });
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| MemoryError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| MemoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .map_err(|source| MemoryError::Io {
                path: self.path.clone(),
                source,
            })?;

        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Most recent touch time per section id across the whole history.
#[must_use]
pub fn last_touched_index(records: &[MemoryRecord]) -> HashMap<String, DateTime<Utc>> {
    let mut index: HashMap<String, DateTime<Utc>> = HashMap::new();
    for record in records {
        for id in &record.sections_touched {
            match index.get(id) {
                Some(existing) if *existing >= record.recorded_at => {}
                _ => {
                    index.insert(id.clone(), record.recorded_at);
                }
            }
        }
    }
    index
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn record(summary: &str, touched: &[&str]) -> MemoryRecord {
        MemoryRecord::new(
            summary,
            touched.iter().map(|s| (*s).to_string()).collect(),
            vec![],
        )
    }

    #[test]
    fn test_load_missing_file_is_empty_history() {
        let dir = TempDir::new().unwrap();
        let memory = ActivityMemory::new(dir.path().join("memories.jsonl"));
        assert!(memory.load().is_empty());
    }

    #[test]
    fn test_append_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let memory = ActivityMemory::new(dir.path().join("memories.jsonl"));

        memory.append(&record("first cycle", &["hero"])).unwrap();
        memory.append(&record("second cycle", &["footer"])).unwrap();

        let records = memory.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "first cycle");
        assert_eq!(records[1].sections_touched, vec!["footer"]);
    }

    #[test]
    fn test_append_never_rewrites_prior_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memories.jsonl");
        let memory = ActivityMemory::new(&path);

        memory.append(&record("first", &[])).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        memory.append(&record("second", &[])).unwrap();
        let after = std::fs::read_to_string(&path).unwrap();

        assert!(after.starts_with(&before), "existing bytes must be intact");
    }

    #[test]
    fn test_corrupt_lines_skipped_and_file_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memories.jsonl");
        let memory = ActivityMemory::new(&path);

        memory.append(&record("good", &["hero"])).unwrap();
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{ this is not json\n");
        std::fs::write(&path, &raw).unwrap();
        memory.append(&record("after corruption", &[])).unwrap();

        let records = memory.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "good");
        assert_eq!(records[1].summary, "after corruption");

        // The corrupt line is still on disk, untouched.
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("{ this is not json"));
    }

    #[test]
    fn test_fully_unreadable_store_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memories.jsonl");
        std::fs::write(&path, b"\xff\xfe not utf8 \xff").unwrap();

        let memory = ActivityMemory::new(&path);
        assert!(memory.load().is_empty());

        // Bytes preserved for inspection.
        assert_eq!(std::fs::read(&path).unwrap(), b"\xff\xfe not utf8 \xff");
    }

    #[test]
    fn test_summary_truncated_on_char_boundary() {
        let long = "é".repeat(MEMORY_SUMMARY_BYTES_MAX); // 2 bytes per char
        let record = MemoryRecord::new(long, vec![], vec![]);
        assert!(record.summary.len() <= MEMORY_SUMMARY_BYTES_MAX + 3);
        assert!(record.summary.ends_with("..."));
    }

    #[test]
    fn test_last_touched_index_keeps_latest() {
        let mut old = record("old", &["hero", "footer"]);
        old.recorded_at = Utc::now() - Duration::days(10);
        let mut newer = record("new", &["hero"]);
        newer.recorded_at = Utc::now() - Duration::days(1);

        let index = last_touched_index(&[old.clone(), newer.clone()]);
        assert_eq!(index.get("hero"), Some(&newer.recorded_at));
        assert_eq!(index.get("footer"), Some(&old.recorded_at));
        assert!(index.get("unseen").is_none());
    }

    #[test]
    fn test_oversized_record_rejected() {
        let dir = TempDir::new().unwrap();
        let memory = ActivityMemory::new(dir.path().join("memories.jsonl"));

        let mut record = record("big", &[]);
        record
            .section_hashes
            .extend((0..2000).map(|i| (format!("s{i}"), "h".repeat(64))));

        let err = memory.append(&record).unwrap_err();
        assert!(matches!(err, MemoryError::RecordTooLarge { .. }));
    }
}

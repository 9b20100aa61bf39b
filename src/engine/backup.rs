//! Backup Store - Versioned Pre-Mutation Snapshots
//!
//! Full copies of the live document taken immediately before each mutating
//! write, keyed by timestamp: `{stem}_{YYYYmmdd_HHMMSS}.{ext}`, with a
//! numeric suffix on same-second collisions. Snapshots are never deleted
//! here — retention is an administrative concern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::constants::{BACKUP_COLLISION_COUNT_MAX, BACKUP_STAMP_FORMAT};

/// Directory of versioned document snapshots.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Create a handle for the store at `dir`. No I/O happens here.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot `source` into the store, named by `now`.
    ///
    /// Returns the snapshot path.
    ///
    /// # Errors
    /// Any I/O failure — the caller must not mutate the live document when
    /// this fails.
    pub fn snapshot(&self, source: &Path, now: DateTime<Utc>) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let stamp = now.format(BACKUP_STAMP_FORMAT);

        let mut target = self.dir.join(format!("{stem}_{stamp}{ext}"));
        let mut collision = 0u32;
        while target.exists() {
            collision += 1;
            if collision > BACKUP_COLLISION_COUNT_MAX {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "too many same-second snapshot collisions",
                ));
            }
            target = self.dir.join(format!("{stem}_{stamp}.{collision}{ext}"));
        }

        std::fs::copy(source, &target)?;
        tracing::info!(snapshot = %target.display(), "backed up document");
        Ok(target)
    }

    /// List existing snapshots, sorted by file name (chronological given
    /// the stamp format).
    ///
    /// # Errors
    /// I/O failure while reading the directory; a missing directory is an
    /// empty store.
    pub fn list(&self) -> std::io::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut snapshots: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        snapshots.sort();
        Ok(snapshots)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_snapshot_copies_full_document() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("index.html");
        std::fs::write(&doc, "<html>live</html>").unwrap();

        let store = BackupStore::new(dir.path().join("backups"));
        let snapshot = store.snapshot(&doc, now()).unwrap();

        assert_eq!(
            std::fs::read_to_string(&snapshot).unwrap(),
            "<html>live</html>"
        );
        assert_eq!(
            snapshot.file_name().unwrap().to_str().unwrap(),
            "index_20260807_030000.html"
        );
    }

    #[test]
    fn test_same_second_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("index.html");
        std::fs::write(&doc, "v1").unwrap();

        let store = BackupStore::new(dir.path().join("backups"));
        let first = store.snapshot(&doc, now()).unwrap();
        std::fs::write(&doc, "v2").unwrap();
        let second = store.snapshot(&doc, now()).unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "v1");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "v2");
    }

    #[test]
    fn test_snapshot_of_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path().join("backups"));
        let result = store.snapshot(&dir.path().join("absent.html"), now());
        assert!(result.is_err());
    }

    #[test]
    fn test_list_sorted_and_missing_dir_empty() {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path().join("backups"));
        assert!(store.list().unwrap().is_empty());

        let doc = dir.path().join("index.html");
        std::fs::write(&doc, "x").unwrap();
        store
            .snapshot(&doc, Utc.with_ymd_and_hms(2026, 8, 7, 4, 0, 0).unwrap())
            .unwrap();
        store.snapshot(&doc, now()).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0] < listed[1]);
    }
}

//! Modification Engine - Surgical Edits, Transactional Commits
//!
//! `TigerStyle`: The central correctness guarantee lives here. `apply`
//! replaces only the content of chosen sections — every other section and
//! all scaffolding is copied byte-for-byte. `commit` snapshots the on-disk
//! document first, then replaces it atomically (temp file + rename), so a
//! failure at any point leaves the live document in its pre-commit state.

mod backup;

pub use backup::BackupStore;

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::document::DocumentModel;

// =============================================================================
// Error Types
// =============================================================================

/// Errors from the commit path. In either case the live document has not
/// been mutated.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The pre-mutation snapshot could not be created; no write was
    /// attempted.
    #[error("backup snapshot failed: {0}")]
    Backup(#[source] std::io::Error),

    /// The new document could not be written; the original file remains
    /// intact (the replacement is staged in a temp file and renamed over).
    #[error("document write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Proof of a completed commit.
#[derive(Debug)]
pub struct CommitReceipt {
    /// Where the pre-mutation snapshot landed, if one was taken (none on
    /// first write of a brand-new document).
    pub backup: Option<PathBuf>,
    /// Size of the committed document.
    pub bytes_written: usize,
}

// =============================================================================
// ModificationEngine
// =============================================================================

/// Commit fault points, injectable under test (DST-style).
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitFault {
    /// Fail after the temp file is written but before the rename.
    WriteAfterBackup,
}

/// Applies generated replacements and commits them transactionally.
#[derive(Debug)]
pub struct ModificationEngine {
    backup: BackupStore,
    #[cfg(test)]
    fault: Option<CommitFault>,
}

impl ModificationEngine {
    /// Create an engine that snapshots into `backup`.
    #[must_use]
    pub fn new(backup: BackupStore) -> Self {
        Self {
            backup,
            #[cfg(test)]
            fault: None,
        }
    }

    /// Inject a commit fault (test builds only).
    #[cfg(test)]
    pub(crate) fn with_fault(mut self, fault: CommitFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// The backup store in use.
    #[must_use]
    pub fn backup_store(&self) -> &BackupStore {
        &self.backup
    }

    /// Replace the content of the chosen sections, restamping each one's
    /// tended marker to `now`. Everything else is copied unchanged.
    ///
    /// A replacement naming an unknown section id is skipped with a
    /// warning rather than failing the batch.
    #[must_use]
    pub fn apply(
        &self,
        mut model: DocumentModel,
        replacements: &[(String, String)],
        now: DateTime<Utc>,
    ) -> DocumentModel {
        for (id, content) in replacements {
            if !model.replace_content(id, content.clone(), now) {
                tracing::warn!(section = %id, "replacement targets unknown section, skipping");
            }
        }
        model
    }

    /// Commit the model to `path`: snapshot the current on-disk document,
    /// then atomically replace it.
    ///
    /// The rename-over-in-place discipline means a reader never observes a
    /// partially written document: it sees the pre-commit bytes until the
    /// rename, the post-commit bytes after.
    ///
    /// # Errors
    /// [`CommitError::Backup`] when the snapshot fails (nothing written);
    /// [`CommitError::Write`] when staging or renaming fails (live document
    /// untouched).
    pub fn commit(
        &self,
        model: &DocumentModel,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<CommitReceipt, CommitError> {
        let html = model.serialize();

        let backup = if path.exists() {
            Some(self.backup.snapshot(path, now).map_err(CommitError::Backup)?)
        } else {
            tracing::info!(path = %path.display(), "no existing document, skipping snapshot");
            None
        };

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir).map_err(CommitError::Write)?;
        }
        let dir = dir.unwrap_or_else(|| Path::new("."));

        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(CommitError::Write)?;
        staged
            .write_all(html.as_bytes())
            .and_then(|()| staged.flush())
            .map_err(CommitError::Write)?;

        #[cfg(test)]
        if self.fault == Some(CommitFault::WriteAfterBackup) {
            // Temp file drops here and is removed; the live document was
            // never touched.
            return Err(CommitError::Write(std::io::Error::other(
                "injected write fault",
            )));
        }

        staged.persist(path).map_err(|e| CommitError::Write(e.error))?;
        tracing::info!(path = %path.display(), bytes = html.len(), "committed document");

        Ok(CommitReceipt {
            backup,
            bytes_written: html.len(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

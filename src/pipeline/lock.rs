//! Cycle Lock - One Writer Per Document
//!
//! A lock artifact next to the live document enforces the one concurrency
//! invariant this design has: at most one cycle runs against a given
//! document path. A second invocation fails fast rather than interleaving
//! writes; a sufficiently old artifact is treated as abandoned (a crashed
//! cycle cannot unlock itself) and reclaimed with a warning.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::constants::{LOCK_FILE_SUFFIX, LOCK_STALE_SECS_MAX};

/// Errors from lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another cycle holds the lock.
    #[error("another cycle is already running (lock: {path})")]
    Busy {
        /// Lock artifact path
        path: PathBuf,
    },

    /// The artifact could not be created or inspected.
    #[error("lock I/O failed: {path}: {source}")]
    Io {
        /// Lock artifact path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Held for the duration of one cycle; the artifact is removed on drop.
#[derive(Debug)]
pub struct CycleLock {
    path: PathBuf,
}

impl CycleLock {
    /// Acquire the lock for the document at `document_path`.
    ///
    /// # Errors
    /// [`LockError::Busy`] when a live lock exists, [`LockError::Io`] on
    /// filesystem failure.
    pub fn acquire(document_path: &Path) -> Result<Self, LockError> {
        let path = lock_path(document_path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;
        }

        match Self::try_create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if is_stale(&path) {
                    tracing::warn!(lock = %path.display(), "reclaiming abandoned cycle lock");
                    let _ = std::fs::remove_file(&path);
                    Self::try_create(&path).map_err(|source| LockError::Io {
                        path: path.clone(),
                        source,
                    })
                } else {
                    Err(LockError::Busy { path })
                }
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    fn try_create(path: &Path) -> std::io::Result<Self> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// The artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release cycle lock");
        }
    }
}

/// Lock artifact path for a document.
fn lock_path(document_path: &Path) -> PathBuf {
    let mut name = document_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    name.push_str(LOCK_FILE_SUFFIX);
    document_path.with_file_name(name)
}

/// Whether an existing artifact is old enough to be abandoned.
fn is_stale(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    modified
        .elapsed()
        .map(|age| age.as_secs() > LOCK_STALE_SECS_MAX)
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================

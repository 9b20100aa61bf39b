//! Message Inbox - Operator Message Glue
//!
//! Reads operator-authored free-text items from a directory. Each `*.txt`
//! file is one message; its filesystem mtime is the receive timestamp.
//! Consumed messages are archived by renaming to `*.read` so the next
//! cycle does not see them again.
//!
//! This is I/O glue around the core: the selector and prompt builder only
//! ever see `[Message]`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::constants::INBOX_MESSAGE_BYTES_MAX;

/// One operator message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Source file name within the inbox directory.
    pub filename: String,
    /// Free-text body.
    pub content: String,
    /// When the message arrived (file mtime).
    pub received_at: DateTime<Utc>,
}

/// A directory of operator messages.
#[derive(Debug, Clone)]
pub struct Inbox {
    dir: PathBuf,
}

impl Inbox {
    /// Create a handle for the inbox at `dir`. No I/O happens here.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The inbox directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read all pending messages, oldest first.
    ///
    /// A missing inbox directory is an empty inbox. Unreadable or oversized
    /// items are skipped with a warning rather than failing the cycle.
    #[must_use]
    pub fn read_pending(&self) -> Vec<Message> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "inbox unreadable");
                return Vec::new();
            }
        };

        let mut messages = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable message");
                    continue;
                }
            };
            if content.len() > INBOX_MESSAGE_BYTES_MAX {
                tracing::warn!(
                    file = %path.display(),
                    len = content.len(),
                    "skipping oversized message"
                );
                continue;
            }

            let received_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);

            messages.push(Message {
                filename: filename.to_string(),
                content,
                received_at,
            });
        }

        messages.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        messages
    }

    /// Archive consumed messages by renaming `*.txt` to `*.read`.
    ///
    /// Best effort: a failed rename is logged and skipped; the message will
    /// simply be re-read next cycle.
    pub fn archive(&self, messages: &[Message]) {
        for message in messages {
            let from = self.dir.join(&message.filename);
            let to = from.with_extension("read");
            if let Err(e) = std::fs::rename(&from, &to) {
                tracing::warn!(file = %from.display(), error = %e, "failed to archive message");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Configuration
//!
//! TOML configuration for the tending engine. A successfully loaded config
//! is always validated; I/O, parse, and semantic errors are distinguished
//! in the error type and every message names the offending file.
//!
//! `init` writes a commented default so a first run has something to edit
//! rather than a stack trace.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{SELECTION_BUDGET_COUNT_DEFAULT, SELECTION_BUDGET_COUNT_MAX};

// =============================================================================
// Error Types
// =============================================================================

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config I/O failed: {file}: {source}")]
    Io {
        /// Config file path
        file: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The TOML is malformed.
    #[error("config parse failed: {file}: {message}")]
    Parse {
        /// Config file path
        file: String,
        /// Parser diagnostic
        message: String,
    },

    /// The values violate a semantic constraint.
    #[error("config invalid: {message}")]
    Validation {
        /// What is wrong
        message: String,
    },
}

// =============================================================================
// Config Types
// =============================================================================

/// Where the website lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// Site root directory.
    pub path: PathBuf,
    /// Live document file name within the site root.
    pub index_file: String,
    /// Snapshot directory (relative paths resolve against the site root).
    pub backup_dir: PathBuf,
}

/// Where operator messages arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    /// Message directory.
    pub message_dir: PathBuf,
}

/// The entity's identity and appetite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Activity memory store (JSON Lines).
    pub memory_file: PathBuf,
    /// Personality line woven into every generation prompt.
    pub persona: String,
    /// Selection budget: maximum sections rewritten per cycle.
    pub max_sections_per_cycle: usize,
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier passed to the production backend.
    pub model: String,
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NiwaConfig {
    /// Website paths.
    pub website: WebsiteConfig,
    /// Inbox paths.
    pub inbox: InboxConfig,
    /// Entity identity.
    pub entity: EntityConfig,
    /// Generation backend.
    pub generation: GenerationConfig,
}

impl Default for NiwaConfig {
    fn default() -> Self {
        Self {
            website: WebsiteConfig {
                path: PathBuf::from("site"),
                index_file: "index.html".to_string(),
                backup_dir: PathBuf::from("backups"),
            },
            inbox: InboxConfig {
                message_dir: PathBuf::from("messages"),
            },
            entity: EntityConfig {
                memory_file: PathBuf::from("memories.jsonl"),
                persona: "ambitious, mathematical, visionary, philosophical".to_string(),
                max_sections_per_cycle: SELECTION_BUDGET_COUNT_DEFAULT,
            },
            generation: GenerationConfig {
                model: "claude-sonnet-4-20250514".to_string(),
            },
        }
    }
}

impl NiwaConfig {
    /// Load and validate a config file.
    ///
    /// # Errors
    /// [`ConfigError::Io`] when unreadable, [`ConfigError::Parse`] when the
    /// TOML is malformed, [`ConfigError::Validation`] when values are out
    /// of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            file: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&content, &path.display().to_string())
    }

    /// Load and validate from a TOML string (testing, embedding).
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Validation`], as for
    /// [`NiwaConfig::load`].
    pub fn load_from_str(content: &str, source_name: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            file: source_name.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints.
    ///
    /// # Errors
    /// [`ConfigError::Validation`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.website.index_file.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "website.index_file must not be empty".to_string(),
            });
        }
        if self.entity.max_sections_per_cycle == 0 {
            return Err(ConfigError::Validation {
                message: "entity.max_sections_per_cycle must be at least 1".to_string(),
            });
        }
        if self.entity.max_sections_per_cycle > SELECTION_BUDGET_COUNT_MAX {
            return Err(ConfigError::Validation {
                message: format!(
                    "entity.max_sections_per_cycle exceeds {SELECTION_BUDGET_COUNT_MAX}"
                ),
            });
        }
        if self.entity.persona.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "entity.persona must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Write a default config to `path`, refusing to overwrite.
    ///
    /// # Errors
    /// [`ConfigError::Io`] when the file already exists or cannot be
    /// written.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let config = Self::default();
        let body = toml::to_string_pretty(&config).map_err(|e| ConfigError::Parse {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
        let content = format!(
            "# niwa configuration\n\
             # Paths are resolved relative to the working directory unless absolute.\n\n{body}"
        );

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let map_io = |source| ConfigError::Io {
            file: path.display().to_string(),
            source,
        };
        use std::io::Write;
        let mut file = options.open(path).map_err(map_io)?;
        file.write_all(content.as_bytes()).map_err(map_io)?;
        Ok(())
    }

    /// Absolute-ish path of the live document.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.website.path.join(&self.website.index_file)
    }

    /// Path of the backup directory, resolved against the site root when
    /// relative.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        if self.website.backup_dir.is_absolute() {
            self.website.backup_dir.clone()
        } else {
            self.website.path.join(&self.website.backup_dir)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

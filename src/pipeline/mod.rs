//! Pipeline Orchestrator - One Wake Cycle
//!
//! `TigerStyle`: Graceful degradation at the section level, strict ordering
//! at the document level.
//!
//! ```text
//! Idle → Loading → Analyzing → Selecting → Generating → Applying → Recording → Idle
//!                                  (Failed is terminal, reachable from any state)
//! ```
//!
//! One cycle: load memory and messages, parse the document (or bootstrap
//! the default template), score and select stale sections, generate
//! replacements through the injected backend, apply and commit with a
//! pre-write snapshot, then append the activity record. The document
//! commit always precedes the memory record, so memory never claims a
//! change that did not durably land. A lock artifact keeps cycles from
//! interleaving on the same document.

mod lock;
mod template;

pub use lock::{CycleLock, LockError};
pub use template::DEFAULT_TEMPLATE;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::NiwaConfig;
use crate::document::{DocumentModel, StructureError};
use crate::engine::{BackupStore, CommitError, ModificationEngine};
use crate::generate::{build_request, Generator, PromptContext};
use crate::inbox::Inbox;
use crate::memory::{ActivityMemory, MemoryError, MemoryRecord};
use crate::selection::{select, SelectionDecision};

// =============================================================================
// Cycle Types
// =============================================================================

/// States of one wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Waiting between cycles.
    Idle,
    /// Reading document, memory, and messages.
    Loading,
    /// Parsing the document.
    Analyzing,
    /// Scoring and selecting sections.
    Selecting,
    /// Calling the generation backend.
    Generating,
    /// Applying and committing changes.
    Applying,
    /// Appending the activity record.
    Recording,
    /// Unrecoverable error ended the cycle.
    Failed,
}

/// Errors that end a cycle in `Failed`.
///
/// Per-section generation failures are NOT here — they degrade to skips.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Another cycle holds the document lock.
    #[error("cycle already in progress for {path}")]
    CycleInProgress {
        /// Lock artifact path
        path: PathBuf,
    },

    /// The lock artifact could not be created.
    #[error(transparent)]
    Lock(LockError),

    /// The document exists but could not be read.
    #[error("document read failed: {path}: {source}")]
    DocumentRead {
        /// Document path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The document could not be parsed at all.
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// Snapshot or write failed; the live document is untouched.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The activity record could not be appended. The document commit, if
    /// any, already landed; the next cycle re-evaluates from slightly
    /// stale history.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl From<LockError> for CycleError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { path } => CycleError::CycleInProgress { path },
            other => CycleError::Lock(other),
        }
    }
}

/// What one cycle did.
#[derive(Debug)]
pub struct CycleReport {
    /// Unique id of this cycle.
    pub cycle_id: Uuid,
    /// Last phase completed (Recording on a full cycle).
    pub phase: CyclePhase,
    /// The selection decision that drove the cycle.
    pub decision: SelectionDecision,
    /// Sections whose content actually changed.
    pub applied: Vec<String>,
    /// Sections skipped because their generation failed, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Pre-mutation snapshot, when one was taken.
    pub backup: Option<PathBuf>,
    /// Whether the default template was synthesised this cycle.
    pub bootstrapped: bool,
    /// Whether the live document was written.
    pub committed: bool,
}

impl CycleReport {
    /// A cycle that selected sections but changed nothing.
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        self.applied.is_empty() && !self.committed
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Wires the document model, selector, generation backend, modification
/// engine, and activity memory into one wake cycle.
pub struct Pipeline<G: Generator> {
    config: NiwaConfig,
    generator: G,
    engine: ModificationEngine,
    memory: ActivityMemory,
    inbox: Inbox,
}

impl<G: Generator> Pipeline<G> {
    /// Build a pipeline from configuration and an injected generation
    /// backend.
    #[must_use]
    pub fn new(config: NiwaConfig, generator: G) -> Self {
        let engine = ModificationEngine::new(BackupStore::new(config.backup_path()));
        let memory = ActivityMemory::new(&config.entity.memory_file);
        let inbox = Inbox::new(&config.inbox.message_dir);
        Self {
            config,
            generator,
            engine,
            memory,
            inbox,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &NiwaConfig {
        &self.config
    }

    /// Run one complete wake cycle.
    ///
    /// # Errors
    /// [`CycleError`] for unrecoverable failures; generation failures are
    /// absorbed as per-section skips and reported in the
    /// [`CycleReport`].
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let now = Utc::now();
        let document_path = self.config.index_path();

        let _lock = CycleLock::acquire(&document_path)?;
        tracing::info!(%cycle_id, document = %document_path.display(), "waking up");

        // ── Loading ──────────────────────────────────────────────────────
        tracing::debug!(phase = ?CyclePhase::Loading, "entering");
        let loaded = self.load_document(&document_path)?;
        let records = self.memory.load();
        let messages = self.inbox.read_pending();

        // ── Analyzing ────────────────────────────────────────────────────
        tracing::debug!(phase = ?CyclePhase::Analyzing, "entering");
        let (mut model, mut bootstrapped) = match loaded {
            Some((raw, mtime)) => (DocumentModel::parse(&raw, mtime)?, false),
            None => (DocumentModel::parse(DEFAULT_TEMPLATE, None)?, true),
        };
        let document_missing = bootstrapped;

        // Zero identifiable sections: bootstrap the template in place and
        // proceed as if it were freshly parsed.
        if model.section_count() == 0 {
            tracing::info!("document has no identifiable sections, bootstrapping template");
            model = DocumentModel::parse(DEFAULT_TEMPLATE, None)?;
            bootstrapped = true;
        }

        // ── Selecting ────────────────────────────────────────────────────
        tracing::debug!(phase = ?CyclePhase::Selecting, "entering");
        let decision = {
            let sections: Vec<_> = model.sections().collect();
            select(
                &sections,
                &records,
                &messages,
                self.config.entity.max_sections_per_cycle,
                now,
            )
        };
        tracing::info!(selected = decision.len(), "selection complete");

        // ── Generating ───────────────────────────────────────────────────
        tracing::debug!(phase = ?CyclePhase::Generating, "entering");
        let mut replacements: Vec<(String, String)> = Vec::new();
        let mut skipped: Vec<(String, String)> = Vec::new();
        for choice in decision.iter() {
            let Some(section) = model.section(&choice.section_id) else {
                continue;
            };
            let request = build_request(&PromptContext {
                section,
                memory: &records,
                messages: &messages,
                persona: &self.config.entity.persona,
                now,
            });
            match self.generator.generate(&request).await {
                Ok(text) => replacements.push((choice.section_id.clone(), text)),
                Err(e) => {
                    tracing::warn!(
                        section = %choice.section_id,
                        error = %e,
                        retryable = e.is_retryable(),
                        "generation failed, skipping section"
                    );
                    skipped.push((choice.section_id.clone(), e.to_string()));
                }
            }
        }

        // ── Applying ─────────────────────────────────────────────────────
        // A fully-skipped cycle is a valid no-op, except that a brand-new
        // site still gets its template written.
        let must_commit = !replacements.is_empty() || document_missing;
        let applied: Vec<String> = replacements.iter().map(|(id, _)| id.clone()).collect();
        let mut backup = None;
        if must_commit {
            tracing::debug!(phase = ?CyclePhase::Applying, "entering");
            model = self.engine.apply(model, &replacements, now);
            let receipt = self.engine.commit(&model, &document_path, now)?;
            backup = receipt.backup;
        } else {
            tracing::info!("no generated content survived, document left untouched");
        }

        // ── Recording ────────────────────────────────────────────────────
        tracing::debug!(phase = ?CyclePhase::Recording, "entering");
        let summary = cycle_summary(&decision, &applied, bootstrapped);
        let mut record = MemoryRecord::new(
            summary,
            applied.clone(),
            messages.iter().map(|m| m.filename.clone()).collect(),
        )
        .with_section_hashes(model.section_hashes());
        record.cycle_id = cycle_id;
        self.memory.append(&record)?;
        self.inbox.archive(&messages);

        tracing::info!(
            %cycle_id,
            applied = applied.len(),
            skipped = skipped.len(),
            "going back to sleep"
        );

        Ok(CycleReport {
            cycle_id,
            phase: CyclePhase::Recording,
            decision,
            applied,
            skipped,
            backup,
            bootstrapped,
            committed: must_commit,
        })
    }

    /// Run the analysis half of a cycle: load, parse, select. No
    /// generation, no writes, no lock — a read-only view of what the next
    /// full cycle would do.
    ///
    /// # Errors
    /// [`CycleError`] when the document exists but cannot be read or
    /// parsed.
    pub fn analyze(&self) -> Result<SelectionDecision, CycleError> {
        let now = Utc::now();
        let document_path = self.config.index_path();

        let loaded = self.load_document(&document_path)?;
        let records = self.memory.load();
        let messages = self.inbox.read_pending();

        let model = match loaded {
            Some((raw, mtime)) => DocumentModel::parse(&raw, mtime)?,
            None => DocumentModel::parse(DEFAULT_TEMPLATE, None)?,
        };

        let sections: Vec<_> = model.sections().collect();
        Ok(select(
            &sections,
            &records,
            &messages,
            self.config.entity.max_sections_per_cycle,
            now,
        ))
    }

    /// Read the live document and its mtime. `Ok(None)` when the document
    /// does not exist (a valid first-run state); an unreadable existing
    /// document is fatal.
    fn load_document(
        &self,
        path: &std::path::Path,
    ) -> Result<Option<(String, Option<DateTime<Utc>>)>, CycleError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let mtime = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .ok();
                Ok(Some((raw, mtime)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CycleError::DocumentRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// One-line cycle summary for the activity record.
fn cycle_summary(decision: &SelectionDecision, applied: &[String], bootstrapped: bool) -> String {
    if bootstrapped && decision.is_empty() {
        return "bootstrapped the default template".to_string();
    }
    if applied.is_empty() {
        return format!(
            "no-op cycle: generation failed for all {} selected section(s)",
            decision.len()
        );
    }
    format!(
        "tended {} of {} selected section(s): {}",
        applied.len(),
        decision.len(),
        applied.join(", ")
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityConfig, GenerationConfig, InboxConfig, WebsiteConfig};
    use crate::generate::SimGenerator;
    use tempfile::TempDir;

    /// A page whose markers are aged relative to the real clock: hero is a
    /// month stale, story a few days.
    fn page() -> String {
        let hero_stamp = (Utc::now() - chrono::Duration::days(30)).to_rfc3339();
        let story_stamp = (Utc::now() - chrono::Duration::days(5)).to_rfc3339();
        format!(
            concat!(
                "<html><body>",
                "<div id=\"hero\" data-niwa-tended=\"{}\"><p>old hero</p></div>",
                "<div id=\"story\" data-niwa-tended=\"{}\"><p>old story</p></div>",
                "<footer id=\"colophon\"><p>footer</p></footer>",
                "</body></html>"
            ),
            hero_stamp, story_stamp
        )
    }

    fn config_for(dir: &TempDir, budget: usize) -> NiwaConfig {
        NiwaConfig {
            website: WebsiteConfig {
                path: dir.path().join("site"),
                index_file: "index.html".to_string(),
                backup_dir: PathBuf::from("backups"),
            },
            inbox: InboxConfig {
                message_dir: dir.path().join("messages"),
            },
            entity: EntityConfig {
                memory_file: dir.path().join("memories.jsonl"),
                persona: "test persona".to_string(),
                max_sections_per_cycle: budget,
            },
            generation: GenerationConfig {
                model: "sim".to_string(),
            },
        }
    }

    fn write_page(config: &NiwaConfig, raw: &str) {
        std::fs::create_dir_all(&config.website.path).unwrap();
        std::fs::write(config.index_path(), raw).unwrap();
    }

    #[tokio::test]
    async fn test_full_cycle_applies_commits_and_records() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        let page = page();
        write_page(&config, &page);

        let pipeline = Pipeline::new(config.clone(), SimGenerator::with_seed(42));
        let report = pipeline.run_cycle().await.unwrap();

        assert_eq!(report.phase, CyclePhase::Recording);
        assert_eq!(report.applied.len(), 2);
        assert!(report.committed);
        assert!(report.backup.is_some());

        // The live document changed, the footer did not.
        let live = std::fs::read_to_string(config.index_path()).unwrap();
        assert!(!live.contains("old hero"));
        assert!(live.contains("<footer id=\"colophon\"><p>footer</p></footer>"));

        // Backup holds the pre-commit bytes.
        let backup = std::fs::read_to_string(report.backup.unwrap()).unwrap();
        assert_eq!(backup, page);

        // Memory recorded the touched sections.
        let records = ActivityMemory::new(&config.entity.memory_file).load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sections_touched, report.applied);
        assert_eq!(records[0].cycle_id, report.cycle_id);
    }

    #[tokio::test]
    async fn test_selects_oldest_sections_first() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 1);
        let page = page();
        write_page(&config, &page);

        let pipeline = Pipeline::new(config, SimGenerator::with_seed(42));
        let report = pipeline.run_cycle().await.unwrap();

        // hero (30 days untended) outranks story (5 days).
        assert_eq!(report.applied, vec!["hero"]);
    }

    #[tokio::test]
    async fn test_missing_document_bootstraps_template() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);

        let pipeline = Pipeline::new(config.clone(), SimGenerator::with_seed(42));
        let report = pipeline.run_cycle().await.unwrap();

        assert!(report.bootstrapped);
        assert!(report.committed);
        assert!(report.backup.is_none(), "nothing existed to snapshot");

        let live = std::fs::read_to_string(config.index_path()).unwrap();
        assert!(live.contains("evolving-thoughts"));
    }

    #[tokio::test]
    async fn test_sectionless_document_bootstraps_not_errors() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        write_page(&config, "<html><body><p>prose only</p></body></html>");

        let pipeline = Pipeline::new(config, SimGenerator::with_seed(42));
        let report = pipeline.run_cycle().await.unwrap();

        assert!(report.bootstrapped);
        // Template sections were selected and tended.
        assert!(!report.applied.is_empty());
    }

    #[tokio::test]
    async fn test_all_generations_failing_is_valid_no_op() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        let page = page();
        write_page(&config, &page);

        let pipeline = Pipeline::new(config.clone(), SimGenerator::failing(42));
        let report = pipeline.run_cycle().await.unwrap();

        assert_eq!(report.phase, CyclePhase::Recording);
        assert!(report.is_no_op());
        assert_eq!(report.skipped.len(), 2);
        assert!(report.applied.is_empty());

        // Live document unmodified.
        assert_eq!(std::fs::read_to_string(config.index_path()).unwrap(), page);

        // Memory records zero sections changed.
        let records = ActivityMemory::new(&config.entity.memory_file).load();
        assert_eq!(records.len(), 1);
        assert!(records[0].sections_touched.is_empty());
        assert!(records[0].summary.contains("no-op"));
    }

    #[tokio::test]
    async fn test_single_generation_failure_skips_only_that_section() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        let page = page();
        write_page(&config, &page);

        let generator =
            SimGenerator::with_seed(42).fail_when_prompt_contains("'hero' section");
        let pipeline = Pipeline::new(config.clone(), generator);
        let report = pipeline.run_cycle().await.unwrap();

        assert_eq!(report.applied, vec!["story"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "hero");

        let live = std::fs::read_to_string(config.index_path()).unwrap();
        assert!(live.contains("old hero"), "skipped section untouched");
        assert!(!live.contains("old story"));
    }

    #[tokio::test]
    async fn test_concurrent_cycle_fails_fast() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        let page = page();
        write_page(&config, &page);

        let held = CycleLock::acquire(&config.index_path()).unwrap();
        let pipeline = Pipeline::new(config, SimGenerator::with_seed(42));
        let err = pipeline.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::CycleInProgress { .. }));
        drop(held);
    }

    #[tokio::test]
    async fn test_unparsable_document_fails_cycle_cleanly() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        write_page(&config, "<html><body><div id=\"a\"><p>never closed</body></html>");

        let pipeline = Pipeline::new(config.clone(), SimGenerator::with_seed(42));
        let err = pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Structure(_)));

        // No partial writes, no memory record.
        assert!(ActivityMemory::new(&config.entity.memory_file).load().is_empty());

        // The lock was released; the next cycle can run.
        assert!(CycleLock::acquire(&config.index_path()).is_ok());
    }

    #[tokio::test]
    async fn test_message_consumed_and_archived() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 1);
        let page = page();
        write_page(&config, &page);
        std::fs::create_dir_all(&config.inbox.message_dir).unwrap();
        std::fs::write(
            config.inbox.message_dir.join("wish.txt"),
            "please refresh the story section",
        )
        .unwrap();

        let pipeline = Pipeline::new(config.clone(), SimGenerator::with_seed(42));
        let report = pipeline.run_cycle().await.unwrap();

        // The message names "story", overriding hero's greater staleness.
        assert_eq!(report.applied, vec!["story"]);

        let records = ActivityMemory::new(&config.entity.memory_file).load();
        assert_eq!(records[0].messages_consumed, vec!["wish.txt"]);

        // Consumed message archived.
        assert!(!config.inbox.message_dir.join("wish.txt").exists());
        assert!(config.inbox.message_dir.join("wish.read").exists());
    }

    #[tokio::test]
    async fn test_analyze_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 2);
        let page = page();
        write_page(&config, &page);
        std::fs::create_dir_all(&config.inbox.message_dir).unwrap();
        std::fs::write(config.inbox.message_dir.join("wish.txt"), "story").unwrap();

        let pipeline = Pipeline::new(config.clone(), SimGenerator::with_seed(42));
        let decision = pipeline.analyze().unwrap();

        assert_eq!(decision.len(), 2);
        // Document unchanged, no memory, message still pending.
        assert_eq!(std::fs::read_to_string(config.index_path()).unwrap(), page);
        assert!(ActivityMemory::new(&config.entity.memory_file).load().is_empty());
        assert!(config.inbox.message_dir.join("wish.txt").exists());
    }

    #[tokio::test]
    async fn test_second_cycle_sees_first_cycles_markers() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, 1);
        let page = page();
        write_page(&config, &page);

        let pipeline = Pipeline::new(config.clone(), SimGenerator::with_seed(42));
        let first = pipeline.run_cycle().await.unwrap();
        assert_eq!(first.applied, vec!["hero"]);

        // hero is now freshly stamped, so the next cycle picks story.
        let second = pipeline.run_cycle().await.unwrap();
        assert_eq!(second.applied, vec!["story"]);
    }
}

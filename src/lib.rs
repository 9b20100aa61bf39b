//! # Niwa
//!
//! A site-tending engine. Niwa ("garden") wakes on a schedule, reads the
//! operator's messages, scores each section of a static website for
//! staleness, rewrites the most neglected ones through an injected
//! text-generation capability, and commits the result with a versioned
//! backup and an append-only memory of what it did.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Pipeline (one cycle)                    │
//! ├────────────────────────────────────────────────────────────┤
//! │  DocumentModel  │  Selector  │  Generator  │  Engine       │
//! ├────────────────────────────────────────────────────────────┤
//! │  ActivityMemory (JSONL)   │  BackupStore  │  Inbox         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`document::DocumentModel`] — span-faithful parse of the page into
//!   identifiable sections plus byte-exact scaffolding
//! - [`selection::select`] — pure staleness scoring under a per-cycle
//!   budget; operator messages override staleness
//! - [`generate::Generator`] — the injected prompt-in/text-out capability,
//!   simulation-first ([`generate::SimGenerator`] is the default for every
//!   test)
//! - [`engine::ModificationEngine`] — surgical apply, snapshot-then-rename
//!   commit
//! - [`memory::ActivityMemory`] — append-only record of past cycles
//! - [`pipeline::Pipeline`] — the wake-cycle state machine and lock
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use niwa::config::NiwaConfig;
//! use niwa::generate::SimGenerator;
//! use niwa::pipeline::Pipeline;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NiwaConfig::default();
//! let pipeline = Pipeline::new(config, SimGenerator::with_seed(42));
//!
//! let report = pipeline.run_cycle().await?;
//! println!("tended {} section(s)", report.applied.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **Surgical edits**: only selected sections change; every other byte
//!   of the document survives a cycle exactly.
//! - **Recoverability**: a full snapshot precedes every write, and the
//!   write itself is temp-file-plus-rename, so an interrupted cycle leaves
//!   the live document either pre- or post-commit, never partial.
//! - **Ordered durability**: the document commit always precedes the
//!   memory record.
//! - **Graceful degradation**: a failed generation skips that section; a
//!   corrupt memory store reads as empty history and is never rewritten.
//! - **One writer**: a lock artifact keeps concurrent cycles off the same
//!   document.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod document;
pub mod engine;
pub mod generate;
pub mod inbox;
pub mod memory;
pub mod pipeline;
pub mod selection;

// Re-export common types
pub use config::{ConfigError, NiwaConfig};
pub use document::{DocumentModel, Section, SectionKind, StructureError, TimestampSource};
pub use engine::{BackupStore, CommitError, CommitReceipt, ModificationEngine};
pub use generate::{GenerationError, GenerationRequest, Generator, SimGenerator};
pub use inbox::{Inbox, Message};
pub use memory::{ActivityMemory, MemoryError, MemoryRecord};
pub use pipeline::{CycleError, CyclePhase, CycleReport, Pipeline, DEFAULT_TEMPLATE};
pub use selection::{select, SectionChoice, SelectionDecision, SelectionReason};

#[cfg(feature = "anthropic")]
pub use generate::AnthropicGenerator;

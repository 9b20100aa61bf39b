//! Staleness Scorer & Selector
//!
//! `TigerStyle`: Pure function of its inputs — `now` is a parameter, so the
//! same sections, memory, messages and clock always produce the same
//! decision.
//!
//! Scoring policy, earlier rules dominating ties:
//! 1. Any section explicitly referenced by a pending operator message is
//!    selected unconditionally — message intent overrides staleness.
//! 2. Remaining slots (up to the budget) fill by descending age, oldest
//!    first. A section with no resolvable timestamp is maximally stale.
//! 3. Ties break by document order.
//!
//! Timestamp precedence per section: tended marker (authoritative), then
//! the most recent memory record touching the section, then file mtime,
//! then nothing.

use chrono::{DateTime, Utc};

use crate::constants::SELECTION_BUDGET_COUNT_MAX;
use crate::document::{Section, SectionKind, TimestampSource};
use crate::inbox::Message;
use crate::memory::{last_touched_index, MemoryRecord};

// =============================================================================
// Decision Types
// =============================================================================

/// Why a section was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// An operator message names this section.
    OperatorMessage {
        /// File name of the referencing message.
        filename: String,
    },
    /// Chosen by staleness ranking.
    Stale {
        /// Elapsed seconds since the section was last tended, if known.
        age_secs: Option<i64>,
    },
}

/// One chosen section.
#[derive(Debug, Clone)]
pub struct SectionChoice {
    /// Section id, resolvable against the parsed model.
    pub section_id: String,
    /// Structural role, carried for prompt construction and reports.
    pub kind: SectionKind,
    /// Why it was chosen.
    pub reason: SelectionReason,
    /// Priority score: seconds of staleness, `i64::MAX` when unresolvable,
    /// and saturated for message-referenced picks so they sort first.
    pub score: i64,
}

/// Ordered list of sections to rewrite this cycle. Ephemeral — consumed by
/// the generation step and discarded when the cycle completes.
#[derive(Debug, Clone, Default)]
pub struct SelectionDecision {
    /// Choices in priority order.
    pub choices: Vec<SectionChoice>,
}

impl SelectionDecision {
    /// True when nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Number of chosen sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    /// Iterate choices in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &SectionChoice> {
        self.choices.iter()
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Choose which sections to rewrite this cycle.
///
/// Pure: no I/O, no clock reads. An empty `sections` slice or a zero
/// `budget` yields an empty decision without error (the former signals a
/// default-template bootstrap to the orchestrator).
#[must_use]
pub fn select(
    sections: &[&Section],
    memory: &[MemoryRecord],
    messages: &[Message],
    budget: usize,
    now: DateTime<Utc>,
) -> SelectionDecision {
    if sections.is_empty() || budget == 0 {
        return SelectionDecision::default();
    }
    let budget = budget.min(SELECTION_BUDGET_COUNT_MAX);

    let touched = last_touched_index(memory);

    // Rule 1: message-referenced sections, in document order.
    let mut choices: Vec<SectionChoice> = Vec::new();
    for section in sections {
        if choices.len() >= budget {
            break;
        }
        if let Some(message) = referencing_message(section, messages) {
            choices.push(SectionChoice {
                section_id: section.id.clone(),
                kind: section.kind,
                reason: SelectionReason::OperatorMessage {
                    filename: message.filename.clone(),
                },
                score: i64::MAX,
            });
        }
    }

    // Rule 2: fill remaining slots by descending age; rule 3: ties keep
    // document order (stable sort over a stable input).
    let mut ranked: Vec<(usize, &&Section, Option<i64>)> = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| !choices.iter().any(|c| c.section_id == s.id))
        .map(|(pos, s)| (pos, s, age_secs(s, &touched, now)))
        .collect();
    ranked.sort_by(|a, b| match (a.2, b.2) {
        (None, None) => a.0.cmp(&b.0),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(&x).then(a.0.cmp(&b.0)),
    });

    for (_, section, age) in ranked {
        if choices.len() >= budget {
            break;
        }
        choices.push(SectionChoice {
            section_id: section.id.clone(),
            kind: section.kind,
            reason: SelectionReason::Stale { age_secs: age },
            score: age.unwrap_or(i64::MAX),
        });
    }

    // Postcondition
    debug_assert!(choices.len() <= budget, "decision exceeds budget");

    SelectionDecision { choices }
}

/// The first pending message whose text names the section, if any.
fn referencing_message<'m>(section: &Section, messages: &'m [Message]) -> Option<&'m Message> {
    messages.iter().find(|m| {
        let haystack = m.content.to_ascii_lowercase();
        haystack.contains(&section.id.to_ascii_lowercase())
    })
}

/// Effective staleness of a section in seconds, or `None` when maximally
/// stale (no resolvable timestamp).
///
/// Marker timestamps are authoritative; a memory record supersedes the
/// mtime fallback but never a marker.
fn age_secs(
    section: &Section,
    touched: &std::collections::HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    let last = match section.timestamp_source {
        TimestampSource::Marker => section.last_modified,
        TimestampSource::FileMtime | TimestampSource::Unknown => touched
            .get(&section.id)
            .copied()
            .or(section.last_modified),
    };
    last.map(|t| (now - t).num_seconds().max(0))
}

// =============================================================================
// Tests
// =============================================================================

//! Document Model - Sections Over Raw Markup
//!
//! `TigerStyle`: Pure transform in both directions, byte-exact scaffolding.
//!
//! Parses raw HTML into an ordered sequence of identifiable sections plus
//! the untouched scaffolding between them. The model is span-faithful:
//! [`DocumentModel::serialize`] concatenates the original bytes back, so a
//! parse/serialize round trip is the identity and untouched sections are
//! byte-identical after an edit.
//!
//! Section identification walks `<body>`'s direct children top-down and
//! classifies container elements with positional/structural heuristics —
//! no fixed schema, so documents authored by hand, by a theme, or by a
//! previous run of this engine all parse.
//!
//! # Timestamps
//!
//! A section's `last_modified` comes from the `data-niwa-tended` marker
//! attribute written by prior commits (authoritative), falling back to the
//! document's filesystem mtime (degraded), else `None` (maximally stale).

mod classify;
mod scanner;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::constants::{
    DOCUMENT_SECTIONS_COUNT_MAX, DOCUMENT_SIZE_BYTES_MAX, SECTION_ID_ATTR, SECTION_ID_BYTES_MAX,
    SECTION_TENDED_ATTR,
};

// =============================================================================
// Error Types
// =============================================================================

/// The document cannot be scanned as well-formed markup at all.
///
/// Absence of identifiable sections is NOT an error — it yields a model
/// with zero sections, which the orchestrator answers with a
/// default-template bootstrap.
#[derive(Debug, Clone, Error)]
pub enum StructureError {
    /// Document exceeds the size limit.
    #[error("document too large: {len} bytes (max {max})")]
    DocumentTooLarge {
        /// Actual length
        len: usize,
        /// Maximum allowed
        max: usize,
    },

    /// A tag never reaches its terminating `>`.
    #[error("tag at byte {offset} is never terminated")]
    UnterminatedTag {
        /// Byte offset of the opening `<`
        offset: usize,
    },

    /// An element opened inside `<body>` is never closed.
    #[error("<{tag}> at byte {offset} is never closed")]
    UnclosedElement {
        /// Element name
        tag: String,
        /// Byte offset of the opening `<`
        offset: usize,
    },

    /// A stray closing tag breaks nesting at the top of `<body>`.
    #[error("stray </{tag}> at byte {offset} breaks nesting")]
    MismatchedClose {
        /// Element name
        tag: String,
        /// Byte offset of the closing `<`
        offset: usize,
    },
}

// =============================================================================
// Section Types
// =============================================================================

/// Tags whose direct-child occurrences under `<body>` become sections.
const SECTION_TAGS: &[&str] = &[
    "div", "section", "header", "footer", "main", "article", "aside", "nav",
];

/// Where a section's `last_modified` timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// `data-niwa-tended` marker written by a prior commit (authoritative).
    Marker,
    /// Document filesystem mtime (degraded fallback).
    FileMtime,
    /// No timestamp could be resolved.
    Unknown,
}

/// Structural role of a section. Closed set with an explicit fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Page header / navigation.
    Header,
    /// Primary content region.
    MainContent,
    /// The running log of engine-authored modifications.
    ModificationsLog,
    /// Page footer.
    Footer,
    /// Structure the heuristics do not recognise.
    Unclassified,
}

impl SectionKind {
    /// Short lowercase label, used in prompts and reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::MainContent => "main-content",
            SectionKind::ModificationsLog => "modifications-log",
            SectionKind::Footer => "footer",
            SectionKind::Unclassified => "unclassified",
        }
    }
}

/// An identifiable, independently updatable region of the document.
#[derive(Debug, Clone)]
pub struct Section {
    /// Stable identifier: explicit marker or `id` attribute when present,
    /// else a positional `{tag}-{ordinal}` fallback.
    pub id: String,
    /// Structural role.
    pub kind: SectionKind,
    /// Element name, lowercased.
    pub tag: String,
    /// Raw inner markup. Opaque to the engine — never interpreted.
    pub content: String,
    /// When this section was last tended, if resolvable.
    pub last_modified: Option<DateTime<Utc>>,
    /// Provenance of `last_modified`.
    pub timestamp_source: TimestampSource,
    /// blake3 hex digest of `content`, for cross-cycle change detection.
    pub content_hash: String,
    /// Raw opening tag text, e.g. `<div id="hero" class="wide">`.
    open_tag: String,
    /// Raw closing tag text, e.g. `</div>`.
    close_tag: String,
}

impl Section {
    /// Whether the section id was read from an explicit attribute rather
    /// than derived positionally. Positional ids are not assumed stable
    /// across structural edits.
    #[must_use]
    pub fn has_explicit_id(&self) -> bool {
        scanner::attr_value(&self.open_tag, SECTION_ID_ATTR)
            .or_else(|| scanner::attr_value(&self.open_tag, "id"))
            .is_some_and(|v| v == self.id)
    }
}

/// One run of the document: scaffolding bytes or a section.
#[derive(Debug, Clone)]
enum Segment {
    /// Bytes not belonging to any section, preserved verbatim.
    Markup(String),
    /// An identifiable section.
    Section(Section),
}

// =============================================================================
// DocumentModel
// =============================================================================

/// Ordered sections plus the scaffolding needed to reconstitute the full
/// document. Owned exclusively by one pipeline run.
#[derive(Debug)]
pub struct DocumentModel {
    segments: Vec<Segment>,
}

impl DocumentModel {
    /// Parse raw HTML into a document model.
    ///
    /// `fallback_modified` is the document's filesystem mtime, applied to
    /// sections that carry no tended marker.
    ///
    /// # Errors
    /// [`StructureError`] when the markup cannot be scanned at all. Zero
    /// identifiable sections is valid and yields an empty section list.
    pub fn parse(
        raw: &str,
        fallback_modified: Option<DateTime<Utc>>,
    ) -> Result<Self, StructureError> {
        if raw.len() > DOCUMENT_SIZE_BYTES_MAX {
            return Err(StructureError::DocumentTooLarge {
                len: raw.len(),
                max: DOCUMENT_SIZE_BYTES_MAX,
            });
        }

        let mut segments = Vec::new();

        let Some(body_content_start) = find_body_content(raw)? else {
            // No <body>: the whole document is scaffolding.
            if !raw.is_empty() {
                segments.push(Segment::Markup(raw.to_string()));
            }
            return Ok(Self { segments });
        };

        let mut markup_start = 0usize; // start of the pending scaffolding run
        let mut i = body_content_start;
        let mut ordinal = 0usize;
        let mut seen_ids: Vec<String> = Vec::new();

        while let Some(rel) = raw[i..].find('<') {
            let lt = i + rel;
            if raw[lt..].starts_with("<!--") {
                i = scanner::skip_comment(raw, lt);
                continue;
            }
            if raw[lt..].starts_with("<!") || raw[lt..].starts_with("<?") {
                i = scanner::skip_declaration(raw, lt);
                continue;
            }
            let Some(tag) = scanner::scan_tag(raw, lt)? else {
                i = lt + 1;
                continue;
            };

            if tag.closing {
                if tag.name == "body" {
                    // Everything from here on is trailing scaffolding.
                    break;
                }
                return Err(StructureError::MismatchedClose {
                    tag: tag.name,
                    offset: lt,
                });
            }

            let (content_end, element_end) = scanner::element_end(raw, &tag, lt)?;

            let eligible = SECTION_TAGS.contains(&tag.name.as_str())
                && !tag.self_closing
                && !tag.is_void();
            if !eligible {
                i = element_end;
                continue;
            }
            if ordinal >= DOCUMENT_SECTIONS_COUNT_MAX {
                tracing::warn!(
                    limit = DOCUMENT_SECTIONS_COUNT_MAX,
                    "section limit reached, treating remainder as scaffolding"
                );
                i = element_end;
                continue;
            }

            // Flush scaffolding up to the section's opening tag.
            if markup_start < lt {
                segments.push(Segment::Markup(raw[markup_start..lt].to_string()));
            }

            let open_tag = raw[lt..tag.end].to_string();
            let content = raw[tag.end..content_end].to_string();
            let close_tag = raw[content_end..element_end].to_string();
            let section = build_section(
                &tag.name,
                open_tag,
                content,
                close_tag,
                ordinal,
                &mut seen_ids,
                fallback_modified,
            );
            segments.push(Segment::Section(section));

            ordinal += 1;
            i = element_end;
            markup_start = element_end;
        }

        // Trailing scaffolding (including `</body>` and beyond, if present).
        if markup_start < raw.len() {
            segments.push(Segment::Markup(raw[markup_start..].to_string()));
        }

        let model = Self { segments };

        // Postcondition: ids are unique within one parse.
        debug_assert!(
            {
                let mut ids: Vec<_> = model.sections().map(|s| s.id.as_str()).collect();
                let before = ids.len();
                ids.sort_unstable();
                ids.dedup();
                ids.len() == before
            },
            "section ids must be unique within a parse"
        );

        Ok(model)
    }

    /// Reconstitute the full document.
    ///
    /// Exact byte concatenation: `serialize(parse(x)) == x` for any `x`
    /// that parses, which makes the round trip idempotent by construction.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Markup(raw) => out.push_str(raw),
                Segment::Section(section) => {
                    out.push_str(&section.open_tag);
                    out.push_str(&section.content);
                    out.push_str(&section.close_tag);
                }
            }
        }
        out
    }

    /// Iterate sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Section(section) => Some(section),
            Segment::Markup(_) => None,
        })
    }

    /// Number of identifiable sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections().count()
    }

    /// Look up a section by id.
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections().find(|s| s.id == id)
    }

    /// blake3 digests of every section, keyed by id.
    #[must_use]
    pub fn section_hashes(&self) -> std::collections::BTreeMap<String, String> {
        self.sections()
            .map(|s| (s.id.clone(), s.content_hash.clone()))
            .collect()
    }

    /// Replace one section's content and restamp its tended marker.
    ///
    /// Returns false (and changes nothing) when no section has the id.
    /// Every other segment is left byte-identical.
    pub(crate) fn replace_content(&mut self, id: &str, content: String, now: DateTime<Utc>) -> bool {
        for segment in &mut self.segments {
            if let Segment::Section(section) = segment {
                if section.id == id {
                    section.open_tag = scanner::set_attr(
                        &section.open_tag,
                        SECTION_TENDED_ATTR,
                        &now.to_rfc3339(),
                    );
                    section.content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();
                    section.content = content;
                    section.last_modified = Some(now);
                    section.timestamp_source = TimestampSource::Marker;
                    return true;
                }
            }
        }
        false
    }
}

// =============================================================================
// Parse Helpers
// =============================================================================

/// Find the byte offset just past the `<body ...>` opening tag.
///
/// Returns `Ok(None)` when the document has no body element.
fn find_body_content(raw: &str) -> Result<Option<usize>, StructureError> {
    let mut i = 0usize;
    while let Some(rel) = raw[i..].find('<') {
        let lt = i + rel;
        if raw[lt..].starts_with("<!--") {
            i = scanner::skip_comment(raw, lt);
            continue;
        }
        if raw[lt..].starts_with("<!") || raw[lt..].starts_with("<?") {
            i = scanner::skip_declaration(raw, lt);
            continue;
        }
        match scanner::scan_tag(raw, lt)? {
            None => i = lt + 1,
            Some(tag) => {
                if !tag.closing && tag.name == "body" {
                    return Ok(Some(tag.end));
                }
                // Skip raw-text elements wholesale so a "<body>" inside a
                // script in <head> cannot fool the search.
                if !tag.closing && tag.is_raw_text() {
                    let (_, end) = scanner::element_end(raw, &tag, lt)?;
                    i = end;
                } else {
                    i = tag.end;
                }
            }
        }
    }
    Ok(None)
}

/// Assemble a [`Section`] from its raw spans.
fn build_section(
    tag: &str,
    open_tag: String,
    content: String,
    close_tag: String,
    ordinal: usize,
    seen_ids: &mut Vec<String>,
    fallback_modified: Option<DateTime<Utc>>,
) -> Section {
    let explicit = scanner::attr_value(&open_tag, SECTION_ID_ATTR)
        .or_else(|| scanner::attr_value(&open_tag, "id"))
        .filter(|v| !v.is_empty() && v.len() <= SECTION_ID_BYTES_MAX);

    // Uniqueness within one parse: a duplicated explicit id falls back to
    // the positional form, deterministically.
    let id = match explicit {
        Some(id) if !seen_ids.contains(&id) => id,
        _ => format!("{tag}-{ordinal}"),
    };
    seen_ids.push(id.clone());

    let (last_modified, timestamp_source) = match scanner::attr_value(&open_tag, SECTION_TENDED_ATTR)
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
    {
        Some(t) => (Some(t.with_timezone(&Utc)), TimestampSource::Marker),
        None => match fallback_modified {
            Some(t) => (Some(t), TimestampSource::FileMtime),
            None => (None, TimestampSource::Unknown),
        },
    };

    let kind = classify::classify(
        tag,
        scanner::attr_value(&open_tag, "id").as_deref(),
        scanner::attr_value(&open_tag, "class").as_deref(),
    );

    let content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();

    Section {
        id,
        kind,
        tag: tag.to_string(),
        content,
        last_modified,
        timestamp_source,
        content_hash,
        open_tag,
        close_tag,
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Structural section classification.
//!
//! Pure heuristics over tag name and `id`/`class` hints — no fixed schema.
//! The vocabulary follows what real pages written by (or for) this system
//! actually carry: semantic HTML5 tags first, then the id/class names the
//! engine itself emits, then common theme names.

use super::SectionKind;

/// Id/class fragments that mark the running modifications log.
const LOG_HINTS: &[&str] = &["modifications", "evolving-thoughts", "ai-thoughts"];

/// Id/class fragments that mark header-like regions.
const HEADER_HINTS: &[&str] = &["header", "masthead", "top"];

/// Id/class fragments that mark footer-like regions.
const FOOTER_HINTS: &[&str] = &["footer", "bottom", "grey"];

/// Id/class fragments that mark primary content regions.
const CONTENT_HINTS: &[&str] = &["content", "main", "featured", "blk", "hero", "about"];

/// Classify a section from its tag name and attribute hints.
///
/// Deterministic: same inputs always yield the same kind. Unrecognised
/// structure falls back to [`SectionKind::Unclassified`] rather than
/// guessing.
pub(crate) fn classify(tag: &str, id: Option<&str>, class: Option<&str>) -> SectionKind {
    match tag {
        "header" | "nav" => return SectionKind::Header,
        "footer" => return SectionKind::Footer,
        "main" | "article" => return SectionKind::MainContent,
        _ => {}
    }

    let id = id.unwrap_or_default().to_ascii_lowercase();
    let class = class.unwrap_or_default().to_ascii_lowercase();
    let hit = |hints: &[&str]| hints.iter().any(|h| id.contains(h) || class.contains(h));

    if hit(LOG_HINTS) {
        SectionKind::ModificationsLog
    } else if hit(HEADER_HINTS) {
        SectionKind::Header
    } else if hit(FOOTER_HINTS) {
        SectionKind::Footer
    } else if hit(CONTENT_HINTS) {
        SectionKind::MainContent
    } else {
        SectionKind::Unclassified
    }
}

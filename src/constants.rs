//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `SELECTION_BUDGET_COUNT_MAX` (not `MAX_SELECTION_BUDGET`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX/MIN` for size limits
//! - _`SECS_*` for time durations
//! - _`COUNT_*` for quantity limits

// =============================================================================
// Document Limits
// =============================================================================

/// Maximum size of a document the parser will accept
pub const DOCUMENT_SIZE_BYTES_MAX: usize = 4 * 1024 * 1024; // 4MB

/// Maximum number of sections recognised in a single parse
pub const DOCUMENT_SECTIONS_COUNT_MAX: usize = 256;

/// Marker attribute carrying a stable section identifier
pub const SECTION_ID_ATTR: &str = "data-niwa-id";

/// Marker attribute carrying the last-tended timestamp (RFC 3339)
pub const SECTION_TENDED_ATTR: &str = "data-niwa-tended";

/// Maximum length of a section identifier
pub const SECTION_ID_BYTES_MAX: usize = 128;

// =============================================================================
// Selection Limits
// =============================================================================

/// Default number of sections eligible for rewrite per cycle
pub const SELECTION_BUDGET_COUNT_DEFAULT: usize = 5;

/// Hard ceiling on the per-cycle section budget
pub const SELECTION_BUDGET_COUNT_MAX: usize = 64;

// =============================================================================
// Generation Limits
// =============================================================================

/// Maximum size of a generation prompt
pub const GENERATION_PROMPT_BYTES_MAX: usize = 100_000; // 100KB

/// Maximum size of a generation response
pub const GENERATION_RESPONSE_BYTES_MAX: usize = 50_000; // 50KB

/// Maximum tokens requested from the generation backend by default
pub const GENERATION_TOKENS_COUNT_DEFAULT: usize = 4000;

/// How much of a section's current markup is quoted in the prompt
pub const SECTION_PROMPT_BYTES_MAX: usize = 5000;

// =============================================================================
// Memory Limits
// =============================================================================

/// Maximum length of a cycle summary stored in a memory record
pub const MEMORY_SUMMARY_BYTES_MAX: usize = 500;

/// How many recent cycle summaries are quoted in a generation prompt
pub const MEMORY_EXCERPT_COUNT_MAX: usize = 5;

/// Maximum size of a single memory record line
pub const MEMORY_RECORD_BYTES_MAX: usize = 64 * 1024; // 64KB

// =============================================================================
// Inbox Limits
// =============================================================================

/// Maximum size of a single operator message
pub const INBOX_MESSAGE_BYTES_MAX: usize = 64 * 1024; // 64KB

/// How many pending messages are quoted in a generation prompt
pub const INBOX_PROMPT_MESSAGES_COUNT_MAX: usize = 10;

// =============================================================================
// Commit / Backup Limits
// =============================================================================

/// Timestamp format for backup snapshot file names
pub const BACKUP_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Maximum same-second collision suffixes tried for a snapshot name
pub const BACKUP_COLLISION_COUNT_MAX: u32 = 1000;

// =============================================================================
// Cycle Lock Limits
// =============================================================================

/// File-name suffix of the cycle lock artifact
pub const LOCK_FILE_SUFFIX: &str = ".niwa-lock";

/// Age after which a lock artifact is considered abandoned and reclaimed
pub const LOCK_STALE_SECS_MAX: u64 = 3600; // 1 hour

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_limits_valid() {
        assert!(SELECTION_BUDGET_COUNT_DEFAULT <= SELECTION_BUDGET_COUNT_MAX);
        assert!(SELECTION_BUDGET_COUNT_DEFAULT > 0);
    }

    #[test]
    fn test_prompt_limits_valid() {
        assert!(SECTION_PROMPT_BYTES_MAX < GENERATION_PROMPT_BYTES_MAX);
        assert!(GENERATION_RESPONSE_BYTES_MAX < GENERATION_PROMPT_BYTES_MAX);
    }

    #[test]
    fn test_marker_attrs_distinct() {
        assert_ne!(SECTION_ID_ATTR, SECTION_TENDED_ATTR);
    }
}

//! Prompt construction for section rewrites.
//!
//! Assembles the generation context the orchestrator hands to the backend:
//! persona, recent activity excerpts, pending operator messages, and the
//! section under consideration. Pure string assembly — truncation limits
//! keep the prompt bounded regardless of document size.

use chrono::{DateTime, Utc};

use super::GenerationRequest;
use crate::constants::{
    GENERATION_TOKENS_COUNT_DEFAULT, INBOX_PROMPT_MESSAGES_COUNT_MAX, MEMORY_EXCERPT_COUNT_MAX,
    SECTION_PROMPT_BYTES_MAX,
};
use crate::document::Section;
use crate::inbox::Message;
use crate::memory::MemoryRecord;

/// Everything the backend needs to rewrite one section.
#[derive(Debug)]
pub struct PromptContext<'a> {
    /// The section being rewritten.
    pub section: &'a Section,
    /// Full activity history; only the most recent summaries are quoted.
    pub memory: &'a [MemoryRecord],
    /// Pending operator messages.
    pub messages: &'a [Message],
    /// Persona line from configuration.
    pub persona: &'a str,
    /// Current cycle time.
    pub now: DateTime<Utc>,
}

/// Build the generation request for one section.
#[must_use]
pub fn build_request(ctx: &PromptContext<'_>) -> GenerationRequest {
    let system = format!(
        "You are the digital voice of a small company's website, with this \
         personality: {persona}.\n\
         You are asked to rewrite exactly one section of the page. Respond \
         with an HTML fragment suitable as that section's inner markup — no \
         <html>, <head> or <body> wrapper, no explanations outside the \
         markup. Match the structure and classes already in use. Keep the \
         site's identity; be bold with the words.",
        persona = ctx.persona
    );

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "It is {}. I am waking up to tend the website.\n",
        ctx.now.format("%Y-%m-%d %H:%M")
    ));

    let recent: Vec<&MemoryRecord> = ctx
        .memory
        .iter()
        .rev()
        .take(MEMORY_EXCERPT_COUNT_MAX)
        .collect();
    if recent.is_empty() {
        prompt.push_str("This is my first recorded cycle.\n");
    } else {
        prompt.push_str("\nWhat I did on recent cycles:\n");
        for record in recent.iter().rev() {
            prompt.push_str(&format!(
                "- {}: {}\n",
                record.recorded_at.format("%Y-%m-%d"),
                record.summary
            ));
        }
    }

    if ctx.messages.is_empty() {
        prompt.push_str("\nNo new operator messages.\n");
    } else {
        prompt.push_str("\nOperator messages since I last woke:\n");
        for message in ctx.messages.iter().take(INBOX_PROMPT_MESSAGES_COUNT_MAX) {
            prompt.push_str(&format!(
                "- {} ({}):\n{}\n",
                message.filename,
                message.received_at.format("%Y-%m-%d %H:%M"),
                message.content.trim()
            ));
        }
    }

    prompt.push_str(&format!(
        "\nI am rewriting the '{id}' section (kind: {kind}). Its current \
         inner markup follows:\n\n{content}\n\nRespond with the replacement \
         inner markup for this section only.",
        id = ctx.section.id,
        kind = ctx.section.kind.label(),
        content = truncated(&ctx.section.content, SECTION_PROMPT_BYTES_MAX),
    ));

    GenerationRequest::new(prompt)
        .with_system(system)
        .with_max_tokens(GENERATION_TOKENS_COUNT_DEFAULT)
}

/// Clip text on a char boundary, marking the cut.
fn truncated(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[... truncated ...]", &text[..cut])
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentModel;
    use chrono::TimeZone;

    fn context_fixture() -> (DocumentModel, Vec<MemoryRecord>, Vec<Message>) {
        let model = DocumentModel::parse(
            "<html><body><div id=\"hero\" class=\"wide\"><p>old</p></div></body></html>",
            None,
        )
        .unwrap();
        let memory = vec![
            MemoryRecord::new("rewrote the footer", vec!["grey".into()], vec![]),
            MemoryRecord::new("freshened the hero copy", vec!["hero".into()], vec![]),
        ];
        let messages = vec![Message {
            filename: "wishes.txt".to_string(),
            content: "More about the stars, please.".to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap(),
        }];
        (model, memory, messages)
    }

    #[test]
    fn test_prompt_names_section_and_kind() {
        let (model, memory, messages) = context_fixture();
        let section = model.section("hero").unwrap();
        let request = build_request(&PromptContext {
            section,
            memory: &memory,
            messages: &messages,
            persona: "ambitious, mathematical",
            now: Utc.with_ymd_and_hms(2026, 8, 7, 3, 0, 0).unwrap(),
        });

        assert!(request.prompt.contains("'hero' section"));
        assert!(request.prompt.contains("main-content"));
        assert!(request.prompt.contains("<p>old</p>"));
    }

    #[test]
    fn test_prompt_quotes_memory_and_messages() {
        let (model, memory, messages) = context_fixture();
        let section = model.section("hero").unwrap();
        let request = build_request(&PromptContext {
            section,
            memory: &memory,
            messages: &messages,
            persona: "visionary",
            now: Utc::now(),
        });

        assert!(request.prompt.contains("rewrote the footer"));
        assert!(request.prompt.contains("freshened the hero copy"));
        assert!(request.prompt.contains("More about the stars, please."));
        assert!(request.system.as_deref().unwrap_or("").contains("visionary"));
    }

    #[test]
    fn test_first_cycle_noted_when_memory_empty() {
        let (model, _, _) = context_fixture();
        let section = model.section("hero").unwrap();
        let request = build_request(&PromptContext {
            section,
            memory: &[],
            messages: &[],
            persona: "p",
            now: Utc::now(),
        });

        assert!(request.prompt.contains("first recorded cycle"));
        assert!(request.prompt.contains("No new operator messages"));
    }

    #[test]
    fn test_large_section_content_truncated() {
        let big = format!(
            "<html><body><div id=\"big\">{}</div></body></html>",
            "y".repeat(SECTION_PROMPT_BYTES_MAX * 2)
        );
        let model = DocumentModel::parse(&big, None).unwrap();
        let section = model.section("big").unwrap();
        let request = build_request(&PromptContext {
            section,
            memory: &[],
            messages: &[],
            persona: "p",
            now: Utc::now(),
        });

        assert!(request.prompt.contains("[... truncated ...]"));
        assert!(request.prompt.len() < SECTION_PROMPT_BYTES_MAX + 2000);
    }
}

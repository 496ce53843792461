//! Answer classification.
//!
//! Parses the three-section model output (`Answer:`, `Sources:`, `Status:`).
//! Parsing is best effort and never fails: output without a recognizable
//! status is classified as insufficient.

use crate::types::Chunk;

const NO_INFORMATION: &str = "no information";
const PARTIAL_INFORMATION: &str = "partial information";
const COMPLETE_INFORMATION: &str = "complete information";
const INSUFFICIENT_PHRASE: &str = "no sufficient information";

/// Classification of one model answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    Insufficient,
    Partial,
    Complete,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Insufficient => "insufficient",
            AnswerStatus::Partial => "partial",
            AnswerStatus::Complete => "complete",
        }
    }
}

/// Strip markdown emphasis, headings and bullets around a line.
fn clean_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| matches!(c, '*' | '#' | '-' | '•' | '_' | '>') || c.is_whitespace())
        .trim()
        .to_lowercase()
}

fn status_prefix(cleaned: &str) -> Option<&str> {
    cleaned.strip_prefix("status:")
}

fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_start_matches(|c: char| matches!(c, '*' | '-' | '•' | '_') || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '*' | '.' | '_') || c.is_whitespace())
        .to_lowercase()
}

/// Value of the last `Status:` marker, lower-cased.
///
/// The value is read from the marker line itself, or from the next non-empty
/// line when the marker stands alone.
fn status_value(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();

    let (idx, rest) = lines.iter().enumerate().rev().find_map(|(idx, line)| {
        let cleaned = clean_line(line);
        status_prefix(&cleaned).map(|rest| (idx, rest.to_string()))
    })?;

    let inline = clean_value(&rest);
    if !inline.is_empty() {
        return Some(inline);
    }

    lines[idx + 1..]
        .iter()
        .map(|line| clean_value(line))
        .find(|value| !value.is_empty())
}

fn status_is(text: &str, expected: &str) -> bool {
    status_value(text).is_some_and(|value| value.starts_with(expected))
}

/// Lower-case, keep ASCII letters and digits, collapse everything else into
/// single spaces. Mangled bytes and smart punctuation become separators.
fn normalize_phrase(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the status is "No information" or the answer says it found no
/// sufficient information.
pub fn is_insufficient(text: &str) -> bool {
    status_is(text, NO_INFORMATION) || normalize_phrase(text).contains(INSUFFICIENT_PHRASE)
}

/// True when the status is "Partial information".
pub fn is_incomplete(text: &str) -> bool {
    status_is(text, PARTIAL_INFORMATION)
}

/// Classify an answer. Anything without a recognizable status is insufficient.
pub fn classify(text: &str) -> AnswerStatus {
    if is_insufficient(text) {
        AnswerStatus::Insufficient
    } else if is_incomplete(text) {
        AnswerStatus::Partial
    } else if status_is(text, COMPLETE_INFORMATION) {
        AnswerStatus::Complete
    } else {
        AnswerStatus::Insufficient
    }
}

/// Document name used for citation matching: last path segment, no
/// extension, lower-cased.
pub fn normalized_source_name(source: &str) -> String {
    let file = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    stem.to_lowercase()
}

/// Lines of the first `Sources:` section, bullets stripped.
fn source_lines(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let Some(pos) = lower.find("sources:") else {
        return Vec::new();
    };

    lower[pos + "sources:".len()..]
        .lines()
        .map(|line| {
            line.trim_matches(|c: char| {
                matches!(c, '-' | '•' | '*' | '·' | 'â' | '€' | '¢') || c.is_whitespace()
            })
            .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Candidates cited in the answer's `Sources:` section, in candidate order.
///
/// A candidate is cited when some source line contains both its normalized
/// document name and its page. Candidates without source or page are never
/// cited.
pub fn extract_cited_chunks(text: &str, candidates: &[Chunk]) -> Vec<Chunk> {
    let lines = source_lines(text);
    if lines.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|chunk| {
            let (Some(source), Some(page)) = (chunk.source_name(), chunk.page_ref()) else {
                return false;
            };

            let name = normalized_source_name(source);
            let page = page.to_string().to_lowercase();
            if name.is_empty() || page.is_empty() {
                return false;
            }

            lines
                .iter()
                .any(|line| line.contains(&name) && line.contains(&page))
        })
        .cloned()
        .collect()
}

/// Remove `Status:` markers and their values from an answer.
pub fn strip_status(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let cleaned = clean_line(lines[i]);
        match status_prefix(&cleaned) {
            Some(rest) if clean_value(rest).is_empty() => {
                // Marker on its own line: drop it and the value that follows.
                i += 1;
                while i < lines.len() && lines[i].trim().is_empty() {
                    i += 1;
                }
                i += 1;
            }
            Some(_) => i += 1,
            None => {
                kept.push(lines[i]);
                i += 1;
            }
        }
    }

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkType, PageRef};

    fn chunk(source: &str, page: PageRef) -> Chunk {
        Chunk::new("content", source, page, ChunkType::Text)
    }

    #[test]
    fn test_is_incomplete() {
        assert!(is_incomplete("Answer:\nx\n\nStatus:\nPartial information"));
        assert!(!is_incomplete("Answer:\nx\n\nStatus:\nComplete information"));
        assert!(is_incomplete("Answer: x\nStatus: partial information."));
        assert!(is_incomplete("**Status:**\n- Partial information"));
    }

    #[test]
    fn test_is_insufficient_by_status() {
        assert!(is_insufficient("Answer:\n-\n\nStatus:\nNo information"));
        assert!(is_insufficient("STATUS: NO INFORMATION"));
        assert!(!is_insufficient("Status:\nComplete information"));
    }

    #[test]
    fn test_is_insufficient_by_phrase() {
        assert!(is_insufficient("❌ No sufficient information found"));
        assert!(is_insufficient("âŒ no sufficient information found"));
        assert!(is_insufficient("NO SUFFICIENT INFORMATION FOUND"));
        assert!(is_insufficient("• No “sufficient” information found"));
        assert!(is_insufficient("No\u{a0}sufficient\u{2019}information"));
        assert!(!is_insufficient("Sufficient information was found."));
    }

    #[test]
    fn test_status_mentions_in_answer_body_ignored() {
        let text = "Answer:\nThe form asks for no information about income.\n\nStatus:\nComplete information";
        assert_eq!(classify(text), AnswerStatus::Complete);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Status: Complete information"), AnswerStatus::Complete);
        assert_eq!(classify("Status: Partial information"), AnswerStatus::Partial);
        assert_eq!(classify("Status: No information"), AnswerStatus::Insufficient);
    }

    #[test]
    fn test_malformed_output_is_insufficient() {
        assert_eq!(classify(""), AnswerStatus::Insufficient);
        assert_eq!(classify("Answer:\nSomething."), AnswerStatus::Insufficient);
        assert_eq!(classify("Status:"), AnswerStatus::Insufficient);
        assert_eq!(classify("Status: unsure"), AnswerStatus::Insufficient);
    }

    #[test]
    fn test_extract_cited_chunks_matches_name_and_page() {
        let text = "Sources:\n- policy.pdf p12";

        let cited = extract_cited_chunks(text, &[chunk("docs/policy.pdf", PageRef::Number(12))]);
        assert_eq!(cited.len(), 1);

        let cited = extract_cited_chunks(text, &[chunk("docs/policy.pdf", PageRef::Number(13))]);
        assert!(cited.is_empty());
    }

    #[test]
    fn test_extract_cited_chunks_keeps_candidate_order() {
        let text = "Answer:\nx\n\nSOURCES:\n• Fees p4\n* handbook.pdf p3-5\n\nStatus:\nComplete information";
        let candidates = vec![
            chunk("handbook.pdf", PageRef::Range(3, 5)),
            chunk("other.pdf", PageRef::Number(4)),
            chunk("C:\\docs\\fees.pdf", PageRef::Number(4)),
        ];

        let cited = extract_cited_chunks(text, &candidates);
        let keys: Vec<String> = cited.iter().map(|c| c.key().to_string()).collect();
        assert_eq!(keys, vec!["handbook.pdf p3-5", "C:\\docs\\fees.pdf p4"]);
    }

    #[test]
    fn test_extract_without_sources_section() {
        let candidates = vec![chunk("policy.pdf", PageRef::Number(1))];
        assert!(extract_cited_chunks("Answer:\npolicy p1", &candidates).is_empty());
    }

    #[test]
    fn test_chunk_without_page_never_cited() {
        let mut no_page = chunk("policy.pdf", PageRef::Number(1));
        no_page.page = None;

        assert!(extract_cited_chunks("Sources:\n- policy p1", &[no_page]).is_empty());
    }

    #[test]
    fn test_normalized_source_name() {
        assert_eq!(normalized_source_name("docs/Policy.PDF"), "policy");
        assert_eq!(normalized_source_name("C:\\a\\b.v2.docx"), "b.v2");
        assert_eq!(normalized_source_name(".env"), ".env");
        assert_eq!(normalized_source_name("README"), "readme");
    }

    #[test]
    fn test_strip_status() {
        let text = "Answer:\nThirty days.\n\nSources:\n- contract p4\n\nStatus:\nComplete information";
        assert_eq!(
            strip_status(text),
            "Answer:\nThirty days.\n\nSources:\n- contract p4"
        );

        assert_eq!(strip_status("Answer: ok\nStatus: Complete information\n"), "Answer: ok");
    }
}

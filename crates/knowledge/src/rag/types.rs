//! RAG response types.

use crate::types::{Chunk, ChunkType};
use serde::{Deserialize, Serialize};

/// Answer returned when the initial search finds nothing.
pub const NO_EVIDENCE_MESSAGE: &str = "No information available in the documents.";

/// Maximum snippet length for source references.
const MAX_SNIPPET_LENGTH: usize = 150;

/// A single source reference used to answer a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagSourceRef {
    /// Source document name or path
    pub source: String,

    /// Page or page range ("12", "3-5")
    pub page: String,

    /// Content kind of the cited chunk
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,

    /// Short snippet of the cited evidence
    pub snippet: String,
}

impl RagSourceRef {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let key = chunk.key();
        Self {
            source: key.source,
            page: key.page,
            chunk_type: chunk.chunk_type,
            snippet: snippet(&chunk.content),
        }
    }
}

fn snippet(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(MAX_SNIPPET_LENGTH) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// Why the answer loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The model reported complete information
    Complete,

    /// Candidates ran out (or the round limit was hit) before a complete answer
    Exhausted,

    /// The initial search returned nothing
    NoEvidence,

    /// Every credential is rate limited
    RateLimited { wait_secs: u64 },

    /// The completion service stayed unreachable
    TransportFailure,
}

/// Response from the answer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Answer text shown to the user
    pub answer: String,

    /// Cited sources in citation order, deduplicated by (source, page)
    pub sources: Vec<RagSourceRef>,

    /// How the loop ended
    pub termination: Termination,

    /// Completed rounds
    pub iterations: usize,
}

impl RagResponse {
    pub fn new(
        answer: impl Into<String>,
        cited: &[Chunk],
        termination: Termination,
        iterations: usize,
    ) -> Self {
        Self {
            answer: answer.into(),
            sources: cited.iter().map(RagSourceRef::from_chunk).collect(),
            termination,
            iterations,
        }
    }

    /// Response for a question with no matching chunks.
    pub fn no_evidence() -> Self {
        Self::new(NO_EVIDENCE_MESSAGE, &[], Termination::NoEvidence, 0)
    }

    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageRef;

    #[test]
    fn test_no_evidence_response() {
        let response = RagResponse::no_evidence();

        assert!(response.answer.to_lowercase().contains("no information available"));
        assert!(response.sources.is_empty());
        assert_eq!(response.termination, Termination::NoEvidence);
    }

    #[test]
    fn test_source_ref_from_chunk() {
        let chunk = Chunk::new(
            "Fees   are\ndue.",
            "docs/fees.pdf",
            PageRef::Range(3, 5),
            ChunkType::Table,
        );

        let source = RagSourceRef::from_chunk(&chunk);
        assert_eq!(source.source, "docs/fees.pdf");
        assert_eq!(source.page, "3-5");
        assert_eq!(source.snippet, "Fees are due.");
    }

    #[test]
    fn test_snippet_truncated() {
        let long = "word ".repeat(100);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), MAX_SNIPPET_LENGTH + 3);
    }

    #[test]
    fn test_termination_serialization() {
        let json = serde_json::to_value(Termination::RateLimited { wait_secs: 12 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "rate_limited", "wait_secs": 12}));
    }
}

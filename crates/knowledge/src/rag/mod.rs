//! RAG (Retrieval-Augmented Generation) answering loop.
//!
//! Components, leaf first:
//! - [`classify`]: parses model answers into a status and cited chunks
//! - [`context`]: builds the bounded context block for a round
//! - [`planner`]: chooses the chunks shown in each round
//! - [`retrieval`]: candidate search and neighbour page lookups
//! - [`answer`]: drives the rounds

pub mod answer;
pub mod classify;
pub mod context;
pub mod planner;
pub mod retrieval;
pub mod state;
pub mod types;

pub use answer::answer_question;
pub use classify::{classify, extract_cited_chunks, is_incomplete, is_insufficient, AnswerStatus};
pub use context::{assemble_context, AssembledContext};
pub use planner::{BatchPlanner, ChunkBatch};
pub use retrieval::{retrieve_candidates, surrounding_pages, CandidatePools};
pub use state::RoundState;
pub use types::{RagResponse, RagSourceRef, Termination, NO_EVIDENCE_MESSAGE};

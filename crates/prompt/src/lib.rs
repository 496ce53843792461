//! Prompt system for docask.
//!
//! This crate owns the text contract between the answer loop and the model:
//! - the built-in system prompt that enforces the Answer / Sources / Status
//!   output format
//! - the user prompt template (conversation summary, sources, question)
//! - YAML overrides of both, rendered with Handlebars
//! - compression of prior conversation turns into a short summary

pub mod builder;
pub mod defaults;
pub mod history;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_answer_prompt, PromptSet};
pub use history::{compress_history, DEFAULT_HISTORY_PAIRS};
pub use loader::{list_prompts, load_prompt, load_prompt_or};
pub use types::{BuiltPrompt, BuiltPromptMetadata, HistoryTurn, PromptDefinition, TurnRole};

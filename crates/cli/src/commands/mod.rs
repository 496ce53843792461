//! Command handlers for the docask CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod collection;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use collection::CollectionCommand;

//! Docask Core Library
//!
//! This crate provides the foundational utilities shared by every docask crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (workspace, provider, credentials, completion tunables)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, CompletionConfig};
pub use error::{AppError, AppResult};

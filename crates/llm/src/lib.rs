//! Completion service crate for docask.
//!
//! This crate provides a provider-agnostic abstraction for chat completions
//! plus the resilience layer the answer loop talks to: a shared credential
//! pool that rotates keys across rate limits, and a completer that turns
//! provider failures into outcomes the loop can act on.
//!
//! # Providers
//! - **OpenAI-compatible** hosted endpoints (Groq by default, OpenAI)
//! - **Ollama**: local runtime, no credentials
//!
//! # Example
//! ```no_run
//! use docask_llm::{create_client, CompletionSettings, CredentialPool, ResilientCompleter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("groq", None, Duration::from_secs(60))?;
//! let pool = Arc::new(CredentialPool::new(vec!["gsk-1".into(), "gsk-2".into()])?);
//! let completer = ResilientCompleter::new(client, pool, CompletionSettings::new("llama-3.3-70b-versatile"));
//! let completion = completer.complete("You are terse.", "Hello").await;
//! println!("{}", completion.text);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod factory;
pub mod providers;
pub mod resilient;
pub mod types;

// Re-export main types
pub use client::{ChatMessage, ChatRole, CompletionError, LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use credentials::{Credential, CredentialPool, CredentialSelection};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use resilient::{Completion, CompletionOutcome, CompletionSettings, ResilientCompleter};
pub use types::ProviderType;

//! LLM client abstraction and request/response types.
//!
//! This module defines the core abstractions for interacting with completion
//! providers. Providers report failures as [`CompletionError`] so callers can
//! tell rate limits and oversized payloads apart from plain transport noise.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model identifier (e.g., "llama-3.3-70b-versatile")
    pub model: String,

    /// Conversation sent to the model, system message first
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Create a new request with no messages.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Append a system message.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(system));
        self
    }

    /// Append a user message.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(user));
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Failure kinds reported by a provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// The credential hit a rate limit (HTTP 429)
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The request body was too large for the provider (HTTP 413)
    #[error("payload too large")]
    PayloadTooLarge,

    /// Any other non-success HTTP status
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Connection, timeout or decoding failure
    #[error("transport failure: {0}")]
    Transport(String),
}

impl CompletionError {
    /// Map a non-success HTTP status to an error kind.
    ///
    /// `retry_after` is the raw `Retry-After` header value, read as seconds.
    pub fn from_status(status: u16, retry_after: Option<&str>, body: String) -> Self {
        match status {
            429 => Self::RateLimited {
                retry_after: retry_after.and_then(parse_retry_after),
            },
            413 => Self::PayloadTooLarge,
            _ => Self::Rejected {
                status,
                message: body,
            },
        }
    }
}

/// Parse a `Retry-After` value given in (possibly fractional) seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs(secs.ceil() as u64))
}

/// Trait for completion providers.
///
/// This trait abstracts the underlying provider (Groq, OpenAI, Ollama, ...).
/// The credential is supplied per call so that a shared pool can rotate keys
/// between requests.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "groq").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming chat completion.
    ///
    /// # Arguments
    /// * `request` - The completion request
    /// * `credential` - Bearer credential, `None` for providers without auth
    async fn complete(
        &self,
        request: &LlmRequest,
        credential: Option<&str>,
    ) -> Result<LlmResponse, CompletionError>;
}

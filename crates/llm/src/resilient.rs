//! Resilient completion calls over a shared credential pool.
//!
//! [`ResilientCompleter::complete`] never returns an error. Every failure is
//! folded into a [`CompletionOutcome`] together with a user-presentable
//! message, because the answer loop decides what to do next from the outcome
//! alone.

use crate::client::{CompletionError, LlmClient, LlmRequest};
use crate::credentials::{wait_secs, CredentialPool, CredentialSelection};
use docask_core::CompletionConfig;
use std::sync::Arc;
use std::time::Duration;

/// Shortest rate-limit window recorded for a credential.
const MIN_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

/// How a completion call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The model produced text
    Ok,

    /// Every credential is rate limited
    AllRateLimited { wait_secs: u64 },

    /// The provider refused the request size; retry with less context
    OversizedPayload,

    /// The provider could not be reached or rejected the request
    TransportError,
}

/// Text returned by a completion call, paired with its outcome.
///
/// For anything but [`CompletionOutcome::Ok`] the text is a message meant for
/// the end user.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub outcome: CompletionOutcome,
}

impl Completion {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            outcome: CompletionOutcome::Ok,
        }
    }

    fn failed(text: impl Into<String>, outcome: CompletionOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == CompletionOutcome::Ok
    }
}

/// Request parameters and retry policy for completion calls.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,

    /// Window applied to a rate-limited credential without a retry hint
    pub rate_limit_fallback: Duration,

    /// Pause between attempts after a transport failure
    pub transport_retry_pause: Duration,

    /// Transport failures tolerated before giving up
    pub max_transport_retries: u32,
}

impl CompletionSettings {
    /// Settings with default tunables for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_config(model, &CompletionConfig::default())
    }

    /// Settings from the application's completion configuration.
    pub fn from_config(model: impl Into<String>, config: &CompletionConfig) -> Self {
        Self {
            model: model.into(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            rate_limit_fallback: Duration::from_secs(config.rate_limit_fallback_secs),
            transport_retry_pause: Duration::from_secs(config.transport_retry_pause_secs),
            max_transport_retries: config.max_transport_retries,
        }
    }
}

/// Completion client that rotates credentials and absorbs transient failures.
pub struct ResilientCompleter {
    client: Arc<dyn LlmClient>,
    pool: Arc<CredentialPool>,
    settings: CompletionSettings,
}

impl ResilientCompleter {
    pub fn new(
        client: Arc<dyn LlmClient>,
        pool: Arc<CredentialPool>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            client,
            pool,
            settings,
        }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Run one completion, rotating credentials until one succeeds.
    ///
    /// - rate limited: the credential is parked (server hint or fallback
    ///   window) and the next credential is tried immediately;
    /// - payload too large: returns at once, the caller must shrink the prompt;
    /// - transport failure: pauses and retries, up to `max_transport_retries`;
    /// - any other rejection: returned as a transport error.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Completion {
        let request = LlmRequest::new(&self.settings.model)
            .with_system(system_prompt)
            .with_user(user_prompt)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_output_tokens);

        let mut transport_failures = 0u32;

        loop {
            let credential = match self.pool.select() {
                CredentialSelection::Available(credential) => credential,
                CredentialSelection::Exhausted { wait } => {
                    let wait_secs = wait_secs(wait);
                    tracing::warn!("All credentials rate limited, next frees up in {}s", wait_secs);
                    return Completion::failed(
                        format!(
                            "All API keys are rate limited. Please wait {} seconds.",
                            wait_secs
                        ),
                        CompletionOutcome::AllRateLimited { wait_secs },
                    );
                }
            };

            tracing::debug!(
                "Sending completion to {} with credential #{}",
                self.client.provider_name(),
                credential.index
            );

            match self.client.complete(&request, credential.secret()).await {
                Ok(response) => {
                    tracing::debug!(
                        "Completion usage - Prompt: {}, Completion: {}",
                        response.usage.prompt_tokens,
                        response.usage.completion_tokens
                    );
                    return Completion::ok(response.content.trim());
                }
                Err(CompletionError::RateLimited { retry_after }) => {
                    let window = retry_after
                        .unwrap_or(self.settings.rate_limit_fallback)
                        .max(MIN_RATE_LIMIT_WINDOW);
                    tracing::warn!(
                        "Credential #{} rate limited for {}s, rotating",
                        credential.index,
                        window.as_secs()
                    );
                    self.pool.mark_rate_limited(credential.index, window);
                }
                Err(CompletionError::PayloadTooLarge) => {
                    tracing::warn!("Completion payload too large");
                    return Completion::failed(
                        "Payload too large",
                        CompletionOutcome::OversizedPayload,
                    );
                }
                Err(CompletionError::Rejected { status, message }) => {
                    tracing::error!("Completion rejected ({}): {}", status, message);
                    return Completion::failed(
                        format!("HTTP Error: {} {}", status, message),
                        CompletionOutcome::TransportError,
                    );
                }
                Err(CompletionError::Transport(message)) => {
                    transport_failures += 1;
                    if transport_failures > self.settings.max_transport_retries {
                        tracing::error!(
                            "Completion failed after {} attempts: {}",
                            transport_failures,
                            message
                        );
                        return Completion::failed(
                            format!(
                                "The completion service is unreachable ({}). Please try again later.",
                                message
                            ),
                            CompletionOutcome::TransportError,
                        );
                    }

                    tracing::warn!(
                        "Transport failure ({}/{}), retrying in {:?}: {}",
                        transport_failures,
                        self.settings.max_transport_retries,
                        self.settings.transport_retry_pause,
                        message
                    );
                    tokio::time::sleep(self.settings.transport_retry_pause).await;
                }
            }
        }
    }
}

//! Crate-level tests that drive the answer loop end to end.

mod answer_loop;

use crate::config::RetrievalConfig;
use crate::types::{Chunk, ChunkType, PageRef};
use docask_llm::{
    ChatRole, CompletionError, CompletionSettings, CredentialPool, LlmClient, LlmRequest,
    LlmResponse, LlmUsage, ResilientCompleter,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Completion client that replays a script and records each user prompt.
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<Result<LlmResponse, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub(crate) fn new(script: Vec<Result<LlmResponse, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// User prompts in call order.
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedModel {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &LlmRequest,
        _credential: Option<&str>,
    ) -> Result<LlmResponse, CompletionError> {
        let user = request
            .messages
            .iter()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(user);

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".to_string())))
    }
}

pub(crate) fn reply(content: &str) -> Result<LlmResponse, CompletionError> {
    Ok(LlmResponse {
        content: content.to_string(),
        model: "scripted".to_string(),
        usage: LlmUsage::default(),
    })
}

pub(crate) fn rate_limited(secs: u64) -> Result<LlmResponse, CompletionError> {
    Err(CompletionError::RateLimited {
        retry_after: Some(Duration::from_secs(secs)),
    })
}

/// Completer over `model` with a single anonymous credential and no
/// transport retries.
pub(crate) fn completer(model: Arc<ScriptedModel>) -> ResilientCompleter {
    let mut settings = CompletionSettings::new("test-model");
    settings.max_transport_retries = 0;
    ResilientCompleter::new(model, Arc::new(CredentialPool::anonymous()), settings)
}

/// Default settings without the minimum text size, so short fixtures count.
pub(crate) fn settings() -> RetrievalConfig {
    RetrievalConfig {
        min_text_tokens: 0,
        ..RetrievalConfig::default()
    }
}

pub(crate) fn text(content: &str, source: &str, page: u32) -> Chunk {
    Chunk::new(content, source, PageRef::Number(page), ChunkType::Text)
}

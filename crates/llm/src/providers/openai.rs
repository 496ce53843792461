//! OpenAI-compatible chat completions provider.
//!
//! Speaks the `/chat/completions` dialect shared by OpenAI and Groq.
//! Credentials are passed per request as a bearer token.

use crate::client::{CompletionError, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docask_core::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;

/// Chat completions response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for OpenAI-compatible hosted endpoints.
pub struct OpenAiCompatClient {
    /// Provider label used in logs ("groq", "openai")
    name: String,

    /// Base URL, e.g. `https://api.groq.com/openai/v1`
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Convert a chat completions body to LlmResponse.
    fn convert_response(
        &self,
        response: ChatCompletionResponse,
    ) -> Result<LlmResponse, CompletionError> {
        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Transport("Response contained no choices".to_string()))?;

        Ok(LlmResponse {
            content,
            model: response.model,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: &LlmRequest,
        credential: Option<&str>,
    ) -> Result<LlmResponse, CompletionError> {
        tracing::debug!(
            "Sending chat completion to {} ({} messages)",
            self.name,
            request.messages.len()
        );

        let mut builder = self.client.post(self.completions_url()).json(request);
        if let Some(token) = credential {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CompletionError::Transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::from_status(
                status.as_u16(),
                retry_after.as_deref(),
                body,
            ));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(format!("Failed to parse response: {}", e)))?;

        self.convert_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiCompatClient {
        OpenAiCompatClient::new("groq", "https://api.groq.com/openai/v1/", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_completions_url_trims_trailing_slash() {
        assert_eq!(
            client().completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(client().provider_name(), "groq");
    }

    #[test]
    fn test_request_body_shape() {
        let request = LlmRequest::new("llama-3.3-70b-versatile")
            .with_system("rules")
            .with_user("question")
            .with_temperature(0.05)
            .with_max_tokens(1000);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_convert_response() {
        let body: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "model": "llama",
            "choices": [{"message": {"role": "assistant", "content": "Answer:\nok"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }))
        .unwrap();

        let response = client().convert_response(body).unwrap();
        assert_eq!(response.content, "Answer:\nok");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_convert_response_without_choices() {
        let body: ChatCompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();

        assert!(matches!(
            client().convert_response(body),
            Err(CompletionError::Transport(_))
        ));
    }
}

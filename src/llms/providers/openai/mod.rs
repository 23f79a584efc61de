//! OpenAI chat completions provider.
//!
//! Talks to `POST {base_url}/chat/completions` with bearer authentication.
//! Any OpenAI-compatible gateway works by overriding the base URL.

use async_trait::async_trait;
use serde_json::Value;

use crate::llms::base_llm::{BaseLLM, BaseLLMState, CallOptions, LLMError, LLMMessage, LLMResponse};
use crate::llms::providers::utils::{post_json_with_retry, token_count};
use crate::llms::LlmProvider;
use crate::types::usage_metrics::UsageMetrics;

/// Default API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAICompletion {
    pub state: BaseLLMState,
    /// Organization header for multi-tenant accounts.
    pub organization: Option<String>,
}

impl OpenAICompletion {
    /// Create a provider for `model`. The API key falls back to
    /// `OPENAI_API_KEY`.
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        let mut state = BaseLLMState::new(model);
        state.api_key = api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok());
        state.base_url = base_url;
        Self {
            state,
            organization: None,
        }
    }

    fn api_base_url(&self) -> &str {
        self.state
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/')
    }

    /// Request body for the chat completions endpoint.
    pub fn build_request_body(&self, messages: &[LLMMessage], options: &CallOptions) -> Value {
        let mut body = serde_json::json!({
            "model": self.state.model,
            "messages": messages,
        });
        if let Some(temp) = self.state.effective_temperature(options) {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = self.state.effective_max_tokens(options) {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !self.state.stop.is_empty() {
            body["stop"] = serde_json::json!(self.state.stop);
        }
        body
    }

    /// Extract the reply text and usage from a chat completions response.
    pub fn parse_response(&self, response: &Value) -> Result<LLMResponse, LLMError> {
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LLMError::InvalidResponse {
                provider: LlmProvider::OpenAI,
                message: "missing choices[0].message.content".to_string(),
            })?;

        let usage = &response["usage"];
        let usage = UsageMetrics::for_request(
            token_count(usage, "prompt_tokens"),
            token_count(usage, "completion_tokens"),
        );

        Ok(LLMResponse {
            content: self.state.apply_stop_words(content),
            model: response["model"]
                .as_str()
                .unwrap_or(&self.state.model)
                .to_string(),
            usage,
        })
    }
}

#[async_trait]
impl BaseLLM for OpenAICompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAI
    }

    fn temperature(&self) -> Option<f64> {
        self.state.temperature
    }

    async fn acall(
        &self,
        messages: &[LLMMessage],
        options: &CallOptions,
    ) -> Result<LLMResponse, LLMError> {
        log::debug!(
            "OpenAICompletion.acall: model={}, messages={}",
            self.state.model,
            messages.len(),
        );

        let api_key = self
            .state
            .api_key
            .as_deref()
            .ok_or(LLMError::MissingApiKey {
                provider: LlmProvider::OpenAI,
            })?;

        let body = self.build_request_body(messages, options);
        let endpoint = format!("{}/chat/completions", self.api_base_url());

        let json = post_json_with_retry(LlmProvider::OpenAI, &self.state, |client| {
            let mut request = client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", api_key));
            if let Some(org) = &self.organization {
                request = request.header("OpenAI-Organization", org);
            }
            request.json(&body)
        })
        .await?;

        let response = self.parse_response(&json)?;
        self.state.track_usage(&response.usage);
        log::debug!(
            "OpenAI usage: prompt={}, completion={}",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );
        Ok(response)
    }

    fn token_usage_summary(&self) -> UsageMetrics {
        self.state.usage_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAICompletion {
        OpenAICompletion::new("gpt-4", Some("sk-test".into()), None)
    }

    #[test]
    fn test_build_request_body() {
        let mut p = provider();
        p.state.temperature = Some(0.2);
        p.state.stop = vec!["\nUser:".into()];
        let messages = vec![LLMMessage::system("context"), LLMMessage::user("hello")];

        let body = p.build_request_body(&messages, &CallOptions::new(0.8, 500));
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["temperature"], 0.8);
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["stop"][0], "\nUser:");

        let body = p.build_request_body(&messages, &CallOptions::default());
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response() {
        let response = serde_json::json!({
            "model": "gpt-4-0613",
            "choices": [{"message": {"role": "assistant", "content": "I support it."}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 5, "total_tokens": 125}
        });
        let parsed = provider().parse_response(&response).unwrap();
        assert_eq!(parsed.content, "I support it.");
        assert_eq!(parsed.model, "gpt-4-0613");
        assert_eq!(parsed.usage.total_tokens, 125);
        assert_eq!(parsed.usage.successful_requests, 1);
    }

    #[test]
    fn test_parse_response_without_content_fails() {
        let response = serde_json::json!({"choices": []});
        assert!(matches!(
            provider().parse_response(&response),
            Err(LLMError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_custom_base_url_is_trimmed() {
        let p = OpenAICompletion::new("m", Some("k".into()), Some("http://localhost:8080/v1/".into()));
        assert_eq!(p.api_base_url(), "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut p = provider();
        p.state.api_key = None;
        let err = p
            .acall(&[LLMMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::MissingApiKey { .. }));
    }
}

//! Anthropic Messages API provider.
//!
//! System messages are lifted out of the message list into the request's
//! `system` field, as the Messages API requires.

use async_trait::async_trait;
use serde_json::Value;

use crate::llms::base_llm::{
    BaseLLM, BaseLLMState, CallOptions, LLMError, LLMMessage, LLMResponse, Role,
};
use crate::llms::providers::utils::{post_json_with_retry, token_count};
use crate::llms::LlmProvider;
use crate::types::usage_metrics::UsageMetrics;

/// Default API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory for the Messages API.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicCompletion {
    pub state: BaseLLMState,
    pub anthropic_version: String,
}

impl AnthropicCompletion {
    /// Create a provider for `model`. The API key falls back to
    /// `ANTHROPIC_API_KEY`.
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        let mut state = BaseLLMState::new(model);
        state.api_key = api_key.or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        state.base_url = base_url;
        Self {
            state,
            anthropic_version: ANTHROPIC_VERSION.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .state
            .base_url
            .as_deref()
            .unwrap_or(ANTHROPIC_BASE_URL)
            .trim_end_matches('/');
        format!("{}/v1/messages", base)
    }

    /// Split system messages from the conversation. Several system messages
    /// are joined with blank lines.
    fn extract_system_and_messages(messages: &[LLMMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut formatted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User | Role::Assistant => formatted.push(serde_json::json!({
                    "role": msg.role,
                    "content": msg.content,
                })),
            }
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, formatted)
    }

    /// Request body for the Messages API.
    pub fn build_request_body(&self, messages: &[LLMMessage], options: &CallOptions) -> Value {
        let (system, formatted) = Self::extract_system_and_messages(messages);

        let mut body = serde_json::json!({
            "model": self.state.model,
            "max_tokens": self.state.effective_max_tokens(options).unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": formatted,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if let Some(temp) = self.state.effective_temperature(options) {
            body["temperature"] = serde_json::json!(temp);
        }
        if !self.state.stop.is_empty() {
            body["stop_sequences"] = serde_json::json!(self.state.stop);
        }
        body
    }

    /// Concatenate the text blocks of a Messages API response.
    pub fn parse_response(&self, response: &Value) -> Result<LLMResponse, LLMError> {
        let blocks = response["content"]
            .as_array()
            .ok_or_else(|| LLMError::InvalidResponse {
                provider: LlmProvider::Anthropic,
                message: "missing content array".to_string(),
            })?;

        let text: String = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = &response["usage"];
        let mut metrics = UsageMetrics::for_request(
            token_count(usage, "input_tokens"),
            token_count(usage, "output_tokens"),
        );
        metrics.cached_prompt_tokens = token_count(usage, "cache_read_input_tokens");

        Ok(LLMResponse {
            content: self.state.apply_stop_words(&text),
            model: response["model"]
                .as_str()
                .unwrap_or(&self.state.model)
                .to_string(),
            usage: metrics,
        })
    }
}

#[async_trait]
impl BaseLLM for AnthropicCompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
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
            "AnthropicCompletion.acall: model={}, messages={}",
            self.state.model,
            messages.len(),
        );

        let api_key = self
            .state
            .api_key
            .as_deref()
            .ok_or(LLMError::MissingApiKey {
                provider: LlmProvider::Anthropic,
            })?;

        let body = self.build_request_body(messages, options);
        let endpoint = self.endpoint();

        let json = post_json_with_retry(LlmProvider::Anthropic, &self.state, |client| {
            client
                .post(&endpoint)
                .header("Content-Type", "application/json")
                .header("x-api-key", api_key)
                .header("anthropic-version", &self.anthropic_version)
                .json(&body)
        })
        .await?;

        let response = self.parse_response(&json)?;
        self.state.track_usage(&response.usage);
        Ok(response)
    }

    fn token_usage_summary(&self) -> UsageMetrics {
        self.state.usage_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicCompletion {
        AnthropicCompletion::new("claude-3-sonnet-20240229", Some("key".into()), None)
    }

    #[test]
    fn test_system_messages_are_extracted() {
        let messages = vec![
            LLMMessage::system("Be concise."),
            LLMMessage::system("Stay in character."),
            LLMMessage::user("What is Rust?"),
        ];
        let body = provider().build_request_body(&messages, &CallOptions::default());
        assert_eq!(body["system"], "Be concise.\n\nStay in character.");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_no_system_field_without_system_messages() {
        let body = provider().build_request_body(&[LLMMessage::user("hi")], &CallOptions::new(0.8, 500));
        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["temperature"], 0.8);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let response = serde_json::json!({
            "model": "claude-3-sonnet-20240229",
            "content": [
                {"type": "text", "text": "Honestly, "},
                {"type": "text", "text": "I'm worried about it."}
            ],
            "usage": {"input_tokens": 100, "output_tokens": 50, "cache_read_input_tokens": 20}
        });
        let parsed = provider().parse_response(&response).unwrap();
        assert_eq!(parsed.content, "Honestly, I'm worried about it.");
        assert_eq!(parsed.usage.prompt_tokens, 100);
        assert_eq!(parsed.usage.total_tokens, 150);
        assert_eq!(parsed.usage.cached_prompt_tokens, 20);
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(provider().endpoint(), "https://api.anthropic.com/v1/messages");
    }
}

//! Ollama provider for locally hosted models.
//!
//! Uses the non-streaming `POST {host}/api/chat` endpoint. No API key.

use async_trait::async_trait;
use serde_json::Value;

use crate::llms::base_llm::{BaseLLM, BaseLLMState, CallOptions, LLMError, LLMMessage, LLMResponse};
use crate::llms::providers::utils::{post_json_with_retry, token_count};
use crate::llms::LlmProvider;
use crate::types::usage_metrics::UsageMetrics;

/// Default local Ollama host.
pub const OLLAMA_DEFAULT_HOST: &str = "http://localhost:11434";

/// Ollama chat client.
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    pub state: BaseLLMState,
}

impl OllamaCompletion {
    /// Create a provider for `model` on `host` (default localhost).
    pub fn new(model: impl Into<String>, host: Option<String>) -> Self {
        let mut state = BaseLLMState::new(model);
        state.base_url = host;
        Self { state }
    }

    fn endpoint(&self) -> String {
        let host = self
            .state
            .base_url
            .as_deref()
            .unwrap_or(OLLAMA_DEFAULT_HOST)
            .trim_end_matches('/');
        format!("{}/api/chat", host)
    }

    /// Request body; sampling settings go under `options`.
    pub fn build_request_body(&self, messages: &[LLMMessage], options: &CallOptions) -> Value {
        let mut model_options = serde_json::Map::new();
        if let Some(temp) = self.state.effective_temperature(options) {
            model_options.insert("temperature".into(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = self.state.effective_max_tokens(options) {
            model_options.insert("num_predict".into(), serde_json::json!(max_tokens));
        }
        if !self.state.stop.is_empty() {
            model_options.insert("stop".into(), serde_json::json!(self.state.stop));
        }
        serde_json::json!({
            "model": self.state.model,
            "messages": messages,
            "stream": false,
            "options": model_options,
        })
    }

    pub fn parse_response(&self, response: &Value) -> Result<LLMResponse, LLMError> {
        let content = response["message"]["content"]
            .as_str()
            .ok_or_else(|| LLMError::InvalidResponse {
                provider: LlmProvider::Ollama,
                message: "missing message.content".to_string(),
            })?;
        Ok(LLMResponse {
            content: self.state.apply_stop_words(content),
            model: response["model"]
                .as_str()
                .unwrap_or(&self.state.model)
                .to_string(),
            usage: UsageMetrics::for_request(
                token_count(response, "prompt_eval_count"),
                token_count(response, "eval_count"),
            ),
        })
    }
}

#[async_trait]
impl BaseLLM for OllamaCompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
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
            "OllamaCompletion.acall: model={}, host={}",
            self.state.model,
            self.endpoint()
        );
        let body = self.build_request_body(messages, options);
        let endpoint = self.endpoint();
        let json = post_json_with_retry(LlmProvider::Ollama, &self.state, |client| {
            client.post(&endpoint).json(&body)
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

    #[test]
    fn test_endpoint_defaults_to_localhost() {
        let p = OllamaCompletion::new("llama3:8b", None);
        assert_eq!(p.endpoint(), "http://localhost:11434/api/chat");
        let p = OllamaCompletion::new("llama3:8b", Some("http://gpu-box:11434/".into()));
        assert_eq!(p.endpoint(), "http://gpu-box:11434/api/chat");
    }

    #[test]
    fn test_request_body_disables_streaming() {
        let p = OllamaCompletion::new("llama3:8b", None);
        let body = p.build_request_body(&[LLMMessage::user("hi")], &CallOptions::new(0.8, 500));
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.8);
        assert_eq!(body["options"]["num_predict"], 500);
    }

    #[test]
    fn test_parse_response() {
        let p = OllamaCompletion::new("llama3:8b", None);
        let response = serde_json::json!({
            "model": "llama3:8b",
            "message": {"role": "assistant", "content": "Sure, I'd buy that."},
            "prompt_eval_count": 300,
            "eval_count": 12
        });
        let parsed = p.parse_response(&response).unwrap();
        assert_eq!(parsed.content, "Sure, I'd buy that.");
        assert_eq!(parsed.usage.total_tokens, 312);
    }
}

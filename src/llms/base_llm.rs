//! Base LLM trait and shared provider state.
//!
//! Every provider implements [`BaseLLM`]: it takes an ordered list of
//! role-tagged messages and returns the model's text plus token usage.
//! Providers are shared across concurrent simulation tasks as
//! `Arc<dyn BaseLLM>`, so usage accounting uses interior mutability.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llms::LlmProvider;
use crate::types::usage_metrics::UsageMetrics;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures raised by LLM providers.
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("{provider} API key not set")]
    MissingApiKey { provider: LlmProvider },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: LlmProvider,
        status: u16,
        body: String,
    },

    #[error("Invalid {provider} response: {message}")]
    InvalidResponse {
        provider: LlmProvider,
        message: String,
    },

    #[error("{provider} call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        provider: LlmProvider,
        attempts: u32,
        last_error: String,
    },
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: Role,
    pub content: String,
}

impl LLMMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call overrides of the provider's generation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    pub fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// A completed LLM call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: UsageMetrics,
}

// ---------------------------------------------------------------------------
// BaseLLM trait
// ---------------------------------------------------------------------------

/// Interface implemented by every LLM provider.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Which provider this is.
    fn provider(&self) -> LlmProvider;

    /// Default sampling temperature, if any.
    fn temperature(&self) -> Option<f64>;

    /// Send `messages` and return the model's reply.
    async fn acall(
        &self,
        messages: &[LLMMessage],
        options: &CallOptions,
    ) -> Result<LLMResponse, LLMError>;

    /// Cumulative usage across all successful calls.
    fn token_usage_summary(&self) -> UsageMetrics;
}

// ---------------------------------------------------------------------------
// Shared provider state
// ---------------------------------------------------------------------------

/// Settings and counters shared by the HTTP providers.
#[derive(Debug, Clone)]
pub struct BaseLLMState {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Sequences after which the reply is cut off.
    pub stop: Vec<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    usage: Arc<Mutex<UsageMetrics>>,
}

impl BaseLLMState {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            api_key: None,
            base_url: None,
            stop: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            usage: Arc::new(Mutex::new(UsageMetrics::default())),
        }
    }

    /// Temperature for one call: the override, else the provider default.
    pub fn effective_temperature(&self, options: &CallOptions) -> Option<f64> {
        options.temperature.or(self.temperature)
    }

    /// Max tokens for one call: the override, else the provider default.
    pub fn effective_max_tokens(&self, options: &CallOptions) -> Option<u32> {
        options.max_tokens.or(self.max_tokens)
    }

    /// Truncate `content` at the earliest stop sequence.
    pub fn apply_stop_words(&self, content: &str) -> String {
        if self.stop.is_empty() || content.is_empty() {
            return content.to_string();
        }

        let earliest = self
            .stop
            .iter()
            .filter_map(|word| content.find(word.as_str()).map(|pos| (pos, word)))
            .min_by_key(|(pos, _)| *pos);

        match earliest {
            Some((pos, word)) => {
                log::debug!("Applied stop word '{}' at position {}", word.escape_debug(), pos);
                content[..pos].trim().to_string()
            }
            None => content.to_string(),
        }
    }

    /// Record the usage of one successful call.
    pub fn track_usage(&self, usage: &UsageMetrics) {
        self.usage.lock().add_usage_metrics(usage);
    }

    pub fn usage_summary(&self) -> UsageMetrics {
        self.usage.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(LLMMessage::system("be nice")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be nice");
    }

    #[test]
    fn test_apply_stop_words_uses_earliest_match() {
        let mut state = BaseLLMState::new("m");
        state.stop = vec!["\nUser:".into(), "###".into()];
        let text = "I think so. ### more\nUser: next";
        assert_eq!(state.apply_stop_words(text), "I think so.");
        assert_eq!(state.apply_stop_words("no stops here"), "no stops here");
    }

    #[test]
    fn test_effective_parameters() {
        let mut state = BaseLLMState::new("m");
        state.temperature = Some(0.3);
        state.max_tokens = Some(100);
        assert_eq!(state.effective_temperature(&CallOptions::default()), Some(0.3));
        let opts = CallOptions::new(0.8, 500);
        assert_eq!(state.effective_temperature(&opts), Some(0.8));
        assert_eq!(state.effective_max_tokens(&opts), Some(500));
    }

    #[test]
    fn test_usage_is_shared_between_clones() {
        let state = BaseLLMState::new("m");
        let clone = state.clone();
        clone.track_usage(&UsageMetrics {
            total_tokens: 30,
            prompt_tokens: 20,
            completion_tokens: 10,
            successful_requests: 1,
            ..Default::default()
        });
        let summary = state.usage_summary();
        assert_eq!(summary.total_tokens, 30);
        assert_eq!(summary.successful_requests, 1);
    }
}

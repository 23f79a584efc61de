//! Persona-facing LLM adapter.
//!
//! [`PersonaLlmAdapter`] wraps one provider and turns every outcome into an
//! [`AdapterResponse`]. Provider errors are logged and reported through
//! `success = false`; they are never propagated, so a single failed persona
//! cannot abort a batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llms::base_llm::{BaseLLM, CallOptions, LLMMessage, Role};
use crate::llms::LlmProvider;
use crate::types::usage_metrics::UsageMetrics;

/// Default sampling temperature for persona replies.
pub const DEFAULT_TEMPERATURE: f64 = 0.8;

/// Default reply length cap for persona replies.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Outcome of one adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub success: bool,
    /// Model reply, or `Error calling {provider}: {error}` on failure.
    pub output_content: String,
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: UsageMetrics,
}

/// Sends persona prompts to one provider.
#[derive(Debug, Clone)]
pub struct PersonaLlmAdapter {
    llm: Arc<dyn BaseLLM>,
    options: CallOptions,
}

impl PersonaLlmAdapter {
    pub fn new(llm: Arc<dyn BaseLLM>) -> Self {
        Self {
            llm,
            options: CallOptions::new(DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS),
        }
    }

    /// Override the per-call generation parameters.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn llm(&self) -> &Arc<dyn BaseLLM> {
        &self.llm
    }

    pub fn provider(&self) -> LlmProvider {
        self.llm.provider()
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Fit `messages` to the provider.
    ///
    /// Anthropic gets a single-turn exchange as one user turn carrying the
    /// system text as `Context:`. Multi-turn conversations and the other
    /// providers pass through unchanged.
    pub fn shape_messages(&self, messages: &[LLMMessage]) -> Vec<LLMMessage> {
        if self.provider() != LlmProvider::Anthropic {
            return messages.to_vec();
        }
        let (system, turns): (Vec<&LLMMessage>, Vec<&LLMMessage>) =
            messages.iter().partition(|m| m.role == Role::System);
        match turns.as_slice() {
            [user] if user.role == Role::User && !system.is_empty() => {
                let context = system
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                vec![LLMMessage::user(format!(
                    "Context: {}\n\nUser: {}",
                    context, user.content
                ))]
            }
            _ => messages.to_vec(),
        }
    }

    /// Ask `prompt` with `context` as the system text.
    pub async fn call_llm(&self, prompt: &str, context: &str) -> AdapterResponse {
        self.call_messages(&[LLMMessage::system(context), LLMMessage::user(prompt)])
            .await
    }

    /// Send messages after shaping them for the provider.
    pub async fn call_messages(&self, messages: &[LLMMessage]) -> AdapterResponse {
        let provider = self.provider();
        let messages = self.shape_messages(messages);
        log::debug!(
            "Calling {} ({}) with {} messages",
            provider,
            self.model(),
            messages.len()
        );

        match self.llm.acall(&messages, &self.options).await {
            Ok(response) => AdapterResponse {
                success: true,
                output_content: response.content,
                provider,
                model: response.model,
                error: None,
                usage: response.usage,
            },
            Err(e) => {
                log::error!("LLM call to {} failed: {}", provider, e);
                AdapterResponse {
                    success: false,
                    output_content: format!("Error calling {}: {}", provider, e),
                    provider,
                    model: self.model().to_string(),
                    error: Some(e.to_string()),
                    usage: UsageMetrics::default(),
                }
            }
        }
    }
}

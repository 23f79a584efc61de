//! LLM access for persona simulation.
//!
//! - [`base_llm`] - the [`BaseLLM`] trait, messages, errors and shared state
//! - [`providers`] - OpenAI, Anthropic, Ollama and the offline mock
//! - [`adapter`] - persona-facing wrapper that never propagates call errors
//!
//! [`create_llm`] builds the configured provider. When a hosted provider is
//! selected without an API key it logs a warning and hands back the mock, so
//! the pipeline always has something to call.

use std::sync::Arc;

use crate::utilities::config::LlmSettings;

pub mod adapter;
pub mod base_llm;
pub mod providers;

// Re-exports for convenience
pub use adapter::{AdapterResponse, PersonaLlmAdapter};
pub use base_llm::{BaseLLM, BaseLLMState, CallOptions, LLMError, LLMMessage, LLMResponse, Role};
pub use providers::{AnthropicCompletion, MockLLM, OllamaCompletion, OpenAICompletion};

/// Stop sequence that keeps a model from writing the interviewer's next turn.
pub const DIALOGUE_STOP: &str = "\nUser:";

string_enum! {
    /// Supported LLM backends.
    pub enum LlmProvider {
        OpenAI => "openai",
        Anthropic => "anthropic" | "claude",
        Ollama => "ollama" | "ollama_local" | "ollama_host",
        Mock => "mock" | "fallback",
    }
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Mock
    }
}

impl LlmProvider {
    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4",
            Self::Anthropic => "claude-3-sonnet-20240229",
            Self::Ollama => "llama3:8b",
            Self::Mock => providers::mock::MOCK_MODEL,
        }
    }

    /// Whether the provider refuses to work without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }

    /// One-line description for `--help` style listings.
    pub fn description(&self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI GPT models (requires API key)",
            Self::Anthropic => "Anthropic Claude models (requires API key)",
            Self::Ollama => "Local Ollama installation (default http://localhost:11434)",
            Self::Mock => "Offline scripted responses (no network)",
        }
    }
}

/// Build the provider described by `settings`.
pub fn create_llm(settings: &LlmSettings) -> Arc<dyn BaseLLM> {
    let provider = settings.provider;
    let model = settings
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());

    let configure = |state: &mut BaseLLMState| {
        state.temperature = Some(settings.temperature);
        state.max_tokens = Some(settings.max_tokens);
        match settings.timeout() {
            Ok(timeout) => state.timeout = timeout,
            Err(e) => log::warn!("{}; keeping the default timeout", e),
        }
        state.max_retries = settings.max_retries;
        state.stop = vec![DIALOGUE_STOP.to_string()];
    };

    let llm: Arc<dyn BaseLLM> = match provider {
        LlmProvider::OpenAI => {
            let mut p = OpenAICompletion::new(model, settings.api_key.clone(), settings.base_url.clone());
            if p.state.api_key.is_none() {
                return fallback_mock(provider, settings);
            }
            configure(&mut p.state);
            Arc::new(p)
        }
        LlmProvider::Anthropic => {
            let mut p =
                AnthropicCompletion::new(model, settings.api_key.clone(), settings.base_url.clone());
            if p.state.api_key.is_none() {
                return fallback_mock(provider, settings);
            }
            configure(&mut p.state);
            Arc::new(p)
        }
        LlmProvider::Ollama => {
            let mut p = OllamaCompletion::new(model, settings.base_url.clone());
            configure(&mut p.state);
            Arc::new(p)
        }
        LlmProvider::Mock => Arc::new(mock_from_settings(settings)),
    };

    log::info!("Using {} provider with model {}", llm.provider(), llm.model());
    llm
}

fn mock_from_settings(settings: &LlmSettings) -> MockLLM {
    match &settings.mock_response {
        Some(response) => MockLLM::with_response(response.clone()),
        None => MockLLM::new(),
    }
}

fn fallback_mock(provider: LlmProvider, settings: &LlmSettings) -> Arc<dyn BaseLLM> {
    log::warn!(
        "{} selected but no API key is configured; falling back to the mock provider",
        provider
    );
    Arc::new(mock_from_settings(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_aliases() {
        assert_eq!("claude".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert_eq!("ollama_local".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!("gemini".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_default_models() {
        assert_eq!(LlmProvider::OpenAI.default_model(), "gpt-4");
        assert_eq!(LlmProvider::Anthropic.default_model(), "claude-3-sonnet-20240229");
        assert_eq!(LlmProvider::Ollama.default_model(), "llama3:8b");
    }

    #[test]
    fn test_create_ollama_uses_default_model() {
        let settings = LlmSettings {
            provider: LlmProvider::Ollama,
            ..LlmSettings::default()
        };
        let llm = create_llm(&settings);
        assert_eq!(llm.provider(), LlmProvider::Ollama);
        assert_eq!(llm.model(), "llama3:8b");
        assert_eq!(llm.temperature(), Some(0.8));
    }

    #[test]
    fn test_create_llm_survives_unbounded_timeout() {
        let settings = LlmSettings {
            provider: LlmProvider::Ollama,
            timeout_secs: f64::INFINITY,
            ..LlmSettings::default()
        };
        let llm = create_llm(&settings);
        assert_eq!(llm.provider(), LlmProvider::Ollama);
    }

    #[test]
    fn test_create_openai_with_key() {
        let settings = LlmSettings {
            provider: LlmProvider::OpenAI,
            model: Some("gpt-4o-mini".into()),
            api_key: Some("sk-test".into()),
            ..LlmSettings::default()
        };
        let llm = create_llm(&settings);
        assert_eq!(llm.provider(), LlmProvider::OpenAI);
        assert_eq!(llm.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_create_mock_with_fixed_response() {
        let settings = LlmSettings {
            mock_response: Some("I support it.".into()),
            ..LlmSettings::default()
        };
        let llm = create_llm(&settings);
        assert_eq!(llm.provider(), LlmProvider::Mock);
        let reply = tokio_test::block_on(
            llm.acall(&[LLMMessage::user("User: anything?")], &CallOptions::default()),
        )
        .unwrap();
        assert_eq!(reply.content, "I support it.");
    }
}

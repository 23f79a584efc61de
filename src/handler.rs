//! Persona transformation and activation.
//!
//! [`PersonaHandler`] is the single place that assembles the full persona
//! request: identity prompt, optional poll context, the question, and the
//! trailing `{name}:` cue that makes the model answer in character.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llms::adapter::PersonaLlmAdapter;
use crate::llms::LlmProvider;
use crate::persona::config::{Demographics, PersonaConfig, ValidationErrors};
use crate::persona::poll_context::PollContext;
use crate::persona::prompt_builder::PersonaPromptBuilder;
use crate::types::usage_metrics::UsageMetrics;

/// System prompt for persona answers.
pub const TRANSFORM_SYSTEM_PROMPT: &str = "You are a persona simulation system. Fully embody the character described below. Respond as that person would, drawing from their background, values, and life experiences.";

/// System prompt for activation checks.
pub const ACTIVATION_SYSTEM_PROMPT: &str =
    "You are a persona simulation. Embody the character described.";

/// Phrases that show the model is speaking as itself.
const SELF_REFERENCE_MARKERS: &[&str] = &["i am", "i'm", "my name"];

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("input_content (user prompt) is required")]
    EmptyInput,

    #[error(transparent)]
    InvalidPersona(#[from] ValidationErrors),

    #[error("Persona transformation failed: {message}")]
    Llm {
        provider: LlmProvider,
        message: String,
    },
}

/// Metadata attached to a persona reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub provider: LlmProvider,
    pub model: String,
    pub persona_name: String,
    pub persona_demographics: Demographics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    /// Words in the identity prompt.
    pub persona_prompt_length: usize,
    /// Words in the poll context block.
    pub poll_data_length: usize,
    pub total_context_length: usize,
    pub response_timestamp: DateTime<Utc>,
    pub usage: UsageMetrics,
}

/// A persona's answer to one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaReply {
    pub output_content: String,
    pub metadata: ReplyMetadata,
}

/// Result of asking a persona to introduce itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationOutcome {
    pub output_content: String,
    pub activation_success: bool,
    pub activation_timestamp: DateTime<Utc>,
}

/// Whether `response` shows the model speaking as `persona`: it must contain
/// the first name, the age, and a self-reference. Case-insensitive.
pub fn identity_confirmed(persona: &PersonaConfig, response: &str) -> bool {
    let text = response.to_lowercase();
    text.contains(&persona.first_name().to_lowercase())
        && text.contains(&persona.age.to_string())
        && SELF_REFERENCE_MARKERS.iter().any(|m| text.contains(m))
}

/// Identity prompt for `persona`, reusing the cached one when present.
pub fn persona_identity(persona: &PersonaConfig) -> String {
    match &persona.persona_prompt {
        Some(prompt) if !prompt.is_empty() => prompt.clone(),
        _ => PersonaPromptBuilder::new(persona).build_persona_prompt(),
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Runs persona requests through one adapter.
#[derive(Debug, Clone)]
pub struct PersonaHandler {
    adapter: PersonaLlmAdapter,
}

impl PersonaHandler {
    pub fn new(adapter: PersonaLlmAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &PersonaLlmAdapter {
        &self.adapter
    }

    /// User turn for a persona answer.
    pub fn build_user_prompt(identity: &str, poll_context: &str, input: &str, name: &str) -> String {
        format!(
            "{}\n\n{}\n\nUser: {}\n\n{}:",
            identity, poll_context, input, name
        )
    }

    /// Answer `input` as `persona`, with optional poll context.
    pub async fn transform(
        &self,
        input: &str,
        persona: &PersonaConfig,
        poll_context: Option<&PollContext>,
    ) -> Result<PersonaReply, HandlerError> {
        if input.trim().is_empty() {
            return Err(HandlerError::EmptyInput);
        }
        persona.validate()?;

        let identity = persona_identity(persona);
        let context = poll_context.map(PollContext::render).unwrap_or_default();
        if !context.is_empty() {
            log::debug!(
                "Using {} poll data points for {}",
                poll_context.map(PollContext::len).unwrap_or(0),
                persona.name
            );
        }

        let identity_words = word_count(&identity);
        let context_words = word_count(&context);

        let prompt = Self::build_user_prompt(&identity, &context, input, &persona.name);
        let response = self.adapter.call_llm(&prompt, TRANSFORM_SYSTEM_PROMPT).await;
        if !response.success {
            return Err(HandlerError::Llm {
                provider: response.provider,
                message: response.error.unwrap_or(response.output_content),
            });
        }

        Ok(PersonaReply {
            output_content: response.output_content,
            metadata: ReplyMetadata {
                provider: response.provider,
                model: response.model,
                persona_name: persona.name.clone(),
                persona_demographics: persona.demographics(),
                occupation: persona.occupation.clone(),
                persona_prompt_length: identity_words,
                poll_data_length: context_words,
                total_context_length: identity_words + context_words,
                response_timestamp: Utc::now(),
                usage: response.usage,
            },
        })
    }

    /// Ask `persona` to introduce itself and check the reply.
    pub async fn activate(&self, persona: &PersonaConfig) -> Result<ActivationOutcome, HandlerError> {
        persona.validate()?;
        let identity = persona_identity(persona);
        let prompt = format!(
            "{}\n\nTo confirm you understand your identity, please introduce yourself as {} in 2-3 sentences, mentioning your age, where you live, and what you do.\n\n{}:",
            identity, persona.name, persona.name
        );
        let response = self.adapter.call_llm(&prompt, ACTIVATION_SYSTEM_PROMPT).await;
        if !response.success {
            return Err(HandlerError::Llm {
                provider: response.provider,
                message: response.error.unwrap_or(response.output_content),
            });
        }

        let confirmed = identity_confirmed(persona, &response.output_content);
        if !confirmed {
            log::warn!(
                "Activation reply for {} did not confirm identity: {}",
                persona.name,
                response.output_content.chars().take(200).collect::<String>()
            );
        }
        Ok(ActivationOutcome {
            output_content: response.output_content,
            activation_success: confirmed,
            activation_timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::base_llm::{BaseLLM, CallOptions, LLMError, LLMMessage, LLMResponse, Role};
    use crate::llms::providers::{MockLLM, OpenAICompletion};
    use crate::persona::config::{Education, Gender, IncomeBracket, LocationType, RaceEthnicity};
    use std::sync::Arc;

    fn maria() -> PersonaConfig {
        PersonaConfig::new(
            "Maria Rodriguez",
            34,
            RaceEthnicity::Hispanic,
            Gender::Female,
            Education::College,
            LocationType::Urban,
            IncomeBracket::From50kTo75k,
        )
    }

    fn handler(llm: MockLLM) -> PersonaHandler {
        PersonaHandler::new(PersonaLlmAdapter::new(Arc::new(llm)))
    }

    #[test]
    fn test_identity_confirmed() {
        let p = maria();
        assert!(identity_confirmed(&p, "Hi, I'm Maria and I'm 34, living in Phoenix."));
        assert!(identity_confirmed(&p, "MY NAME is maria, age 34."));
        assert!(!identity_confirmed(&p, "Hi, I'm Maria from Phoenix."));
        assert!(!identity_confirmed(&p, "Maria, 34, nurse."));
        assert!(!identity_confirmed(&p, "I'm Sofia, 34."));
    }

    #[test]
    fn test_user_prompt_layout() {
        let prompt = PersonaHandler::build_user_prompt("IDENTITY", "POLLS", "Question?", "Maria");
        assert_eq!(prompt, "IDENTITY\n\nPOLLS\n\nUser: Question?\n\nMaria:");
    }

    #[tokio::test]
    async fn test_transform_returns_reply_with_metadata() {
        let h = handler(MockLLM::with_response("I'd support that, honestly."));
        let mut ctx = PollContext::new();
        ctx.push_note("healthcare", "People like you favor expanded coverage.");

        let reply = h
            .transform("Do you support the plan?", &maria(), Some(&ctx))
            .await
            .unwrap();
        assert_eq!(reply.output_content, "I'd support that, honestly.");
        let meta = &reply.metadata;
        assert_eq!(meta.provider, LlmProvider::Mock);
        assert_eq!(meta.persona_name, "Maria Rodriguez");
        assert!(meta.persona_prompt_length > 300);
        assert!(meta.poll_data_length > 0);
        assert_eq!(
            meta.total_context_length,
            meta.persona_prompt_length + meta.poll_data_length
        );
    }

    #[tokio::test]
    async fn test_transform_rejects_empty_input() {
        let h = handler(MockLLM::new());
        let err = h.transform("   ", &maria(), None).await.unwrap_err();
        assert!(matches!(err, HandlerError::EmptyInput));
    }

    #[tokio::test]
    async fn test_transform_rejects_invalid_persona() {
        let h = handler(MockLLM::new());
        let mut p = maria();
        p.age = 99;
        let err = h.transform("Question?", &p, None).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPersona(_)));
    }

    #[tokio::test]
    async fn test_transform_surfaces_llm_failure() {
        let mut llm = OpenAICompletion::new("gpt-4", None, None);
        llm.state.api_key = None;
        let h = PersonaHandler::new(PersonaLlmAdapter::new(Arc::new(llm)));
        let err = h.transform("Question?", &maria(), None).await.unwrap_err();
        assert!(matches!(err, HandlerError::Llm { provider: LlmProvider::OpenAI, .. }));
    }

    #[tokio::test]
    async fn test_activation_with_mock_succeeds() {
        let h = handler(MockLLM::new());
        let outcome = h.activate(&maria()).await.unwrap();
        assert!(outcome.activation_success, "reply: {}", outcome.output_content);
    }

    #[tokio::test]
    async fn test_activation_fails_on_generic_reply() {
        let h = handler(MockLLM::new().with_rule("introduce", "Hello there."));
        // Without an identity line the mock cannot introduce the persona,
        // so the rule answers instead.
        let mut p = maria();
        p.persona_prompt = Some("Someone from somewhere.".into());
        let outcome = h.activate(&p).await.unwrap();
        assert!(!outcome.activation_success);
        assert_eq!(outcome.output_content, "Hello there.");
    }

    /// Records every request and answers as an Anthropic model.
    #[derive(Debug, Default)]
    struct RecordingAnthropic {
        requests: parking_lot::Mutex<Vec<Vec<LLMMessage>>>,
    }

    #[async_trait::async_trait]
    impl BaseLLM for RecordingAnthropic {
        fn model(&self) -> &str {
            "claude-3-sonnet-20240229"
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::Anthropic
        }

        fn temperature(&self) -> Option<f64> {
            None
        }

        async fn acall(
            &self,
            messages: &[LLMMessage],
            _options: &CallOptions,
        ) -> Result<LLMResponse, LLMError> {
            self.requests.lock().push(messages.to_vec());
            Ok(LLMResponse {
                content: "I support it.".to_string(),
                model: self.model().to_string(),
                usage: UsageMetrics::for_request(10, 3),
            })
        }

        fn token_usage_summary(&self) -> UsageMetrics {
            UsageMetrics::default()
        }
    }

    #[tokio::test]
    async fn test_transform_sends_anthropic_single_turn() {
        let llm = Arc::new(RecordingAnthropic::default());
        let h = PersonaHandler::new(PersonaLlmAdapter::new(llm.clone()));
        let reply = h.transform("Do you support the plan?", &maria(), None).await.unwrap();
        assert_eq!(reply.metadata.provider, LlmProvider::Anthropic);

        let requests = llm.requests.lock();
        assert_eq!(requests.len(), 1);
        let [only] = requests[0].as_slice() else {
            panic!("expected one message, got {:?}", requests[0]);
        };
        assert_eq!(only.role, Role::User);
        assert!(only.content.starts_with("Context: "));
        assert!(only.content.contains("\n\nUser: "));
        assert!(only.content.ends_with("User: Do you support the plan?\n\nMaria Rodriguez:"));
    }
}

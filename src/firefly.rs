//! Single-use persona agents.
//!
//! A [`PersonaFirefly`] lives for exactly one stimulus:
//!
//! ```text
//! new ──birth()──▶ Activated ──glow(self)──▶ FireflyResponse
//!                                     └─ dropped (disappears)
//! ```
//!
//! `glow` takes the firefly by value, so a firefly cannot be reused after it
//! has answered; disappearance is its `Drop`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::handler::{HandlerError, PersonaHandler};
use crate::persona::config::{Demographics, PersonaConfig};
use crate::persona::poll_context::PollContext;
use crate::persona::prompt_builder::PersonaPromptBuilder;
use crate::persona::stimulus::{StimulusConfig, StimulusType};

/// Purpose used when none is given.
pub const DEFAULT_PURPOSE: &str = "persona_interaction";

#[derive(Debug, Error)]
pub enum FireflyError {
    #[error("Failed to activate persona: {name}")]
    ActivationFailed { name: String },

    #[error("No prompt provided in stimulus '{stimulus_id}'")]
    EmptyStimulus { stimulus_id: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireflyState {
    Created,
    Activated,
}

/// What a firefly hands back after its one interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireflyResponse {
    pub persona_response: String,
    pub persona_name: String,
    pub persona_demographics: Demographics,
    pub stimulus_type: StimulusType,
    pub interaction_number: u32,
    pub response_timestamp: DateTime<Utc>,
    pub firefly_id: Uuid,
    pub purpose_complete: bool,
}

/// Ephemeral persona agent.
#[derive(Debug)]
pub struct PersonaFirefly {
    firefly_id: Uuid,
    purpose: String,
    persona: PersonaConfig,
    handler: PersonaHandler,
    poll_context: Option<PollContext>,
    state: FireflyState,
    activation_timestamp: Option<DateTime<Utc>>,
    total_interactions: u32,
}

impl PersonaFirefly {
    pub fn new(persona: PersonaConfig, handler: PersonaHandler) -> Self {
        Self {
            firefly_id: Uuid::new_v4(),
            purpose: DEFAULT_PURPOSE.to_string(),
            persona,
            handler,
            poll_context: None,
            state: FireflyState::Created,
            activation_timestamp: None,
            total_interactions: 0,
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    /// Poll insights to include when answering.
    pub fn with_poll_context(mut self, context: PollContext) -> Self {
        self.poll_context = Some(context);
        self
    }

    pub fn id(&self) -> Uuid {
        self.firefly_id
    }

    pub fn state(&self) -> FireflyState {
        self.state
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn activation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.activation_timestamp
    }

    /// Build the identity prompt and confirm the model has adopted it.
    pub async fn birth(&mut self) -> Result<(), FireflyError> {
        log::debug!(
            "Firefly {} born with purpose: {}",
            self.firefly_id,
            self.purpose
        );

        let identity = PersonaPromptBuilder::new(&self.persona).build_persona_prompt();
        log::debug!(
            "Generated {} word persona identity for {}",
            identity.split_whitespace().count(),
            self.persona.name
        );
        self.persona.persona_prompt = Some(identity);

        let outcome = self.handler.activate(&self.persona).await?;
        if !outcome.activation_success {
            return Err(FireflyError::ActivationFailed {
                name: self.persona.name.clone(),
            });
        }

        self.state = FireflyState::Activated;
        self.activation_timestamp = Some(outcome.activation_timestamp);
        log::info!("Activated persona {}", self.persona.name);
        Ok(())
    }

    /// Answer one stimulus, then disappear.
    pub async fn glow(mut self, stimulus: &StimulusConfig) -> Result<FireflyResponse, FireflyError> {
        if self.state != FireflyState::Activated {
            self.birth().await?;
        }

        let prompt = stimulus
            .enhanced_prompt()
            .ok_or_else(|| FireflyError::EmptyStimulus {
                stimulus_id: stimulus.stimulus_id.clone(),
            })?;

        let reply = self
            .handler
            .transform(&prompt, &self.persona, self.poll_context.as_ref())
            .await?;
        self.total_interactions += 1;

        Ok(FireflyResponse {
            persona_response: reply.output_content,
            persona_name: self.persona.name.clone(),
            persona_demographics: self.persona.demographics(),
            stimulus_type: stimulus.stimulus_type,
            interaction_number: self.total_interactions,
            response_timestamp: Utc::now(),
            firefly_id: self.firefly_id,
            purpose_complete: true,
        })
    }
}

impl Drop for PersonaFirefly {
    fn drop(&mut self) {
        log::debug!(
            "Firefly {} disappeared after fulfilling purpose: {} ({} interactions)",
            self.firefly_id,
            self.purpose,
            self.total_interactions
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::adapter::PersonaLlmAdapter;
    use crate::llms::providers::MockLLM;
    use crate::persona::config::{Education, Gender, IncomeBracket, LocationType, RaceEthnicity};
    use std::sync::Arc;

    fn james() -> PersonaConfig {
        PersonaConfig::new(
            "James Wilson",
            58,
            RaceEthnicity::White,
            Gender::Male,
            Education::HighSchool,
            LocationType::Rural,
            IncomeBracket::From30kTo50k,
        )
    }

    fn handler(llm: MockLLM) -> PersonaHandler {
        PersonaHandler::new(PersonaLlmAdapter::new(Arc::new(llm)))
    }

    #[tokio::test]
    async fn test_birth_activates_and_caches_identity() {
        let mut firefly = PersonaFirefly::new(james(), handler(MockLLM::new()));
        assert_eq!(firefly.state(), FireflyState::Created);
        firefly.birth().await.unwrap();
        assert_eq!(firefly.state(), FireflyState::Activated);
        assert!(firefly.activation_timestamp().is_some());
        assert!(firefly
            .persona()
            .persona_prompt
            .as_deref()
            .unwrap()
            .starts_with("You are James Wilson, a 58-year-old"));
    }

    #[tokio::test]
    async fn test_glow_births_and_answers_once() {
        let llm = MockLLM::new().with_rule("tariffs", "I'm worried about what it does to prices.");
        let firefly = PersonaFirefly::new(james(), handler(llm.clone())).with_purpose("tariff survey");
        let id = firefly.id();
        let stimulus = StimulusConfig {
            stimulus_type: StimulusType::PoliticalSurvey,
            ..StimulusConfig::question("q1", "How do you feel about new tariffs?")
        };

        let response = firefly.glow(&stimulus).await.unwrap();
        assert_eq!(response.persona_response, "I'm worried about what it does to prices.");
        assert_eq!(response.persona_name, "James Wilson");
        assert_eq!(response.stimulus_type, StimulusType::PoliticalSurvey);
        assert_eq!(response.interaction_number, 1);
        assert_eq!(response.firefly_id, id);
        assert!(response.purpose_complete);
        // activation + answer
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_activation() {
        let llm = MockLLM::with_response("Hello.").without_introductions();
        let mut firefly = PersonaFirefly::new(james(), handler(llm));
        let err = firefly.birth().await.unwrap_err();
        assert!(matches!(err, FireflyError::ActivationFailed { ref name } if name == "James Wilson"));
        assert_eq!(firefly.state(), FireflyState::Created);
    }

    #[tokio::test]
    async fn test_glow_propagates_activation_failure() {
        let llm = MockLLM::with_response("Hello.").without_introductions();
        let firefly = PersonaFirefly::new(james(), handler(llm));
        let err = firefly
            .glow(&StimulusConfig::question("q", "Anything?"))
            .await
            .unwrap_err();
        assert!(matches!(err, FireflyError::ActivationFailed { .. }));
    }

    #[tokio::test]
    async fn test_empty_stimulus_is_rejected() {
        let firefly = PersonaFirefly::new(james(), handler(MockLLM::new()));
        let err = firefly
            .glow(&StimulusConfig::question("empty", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, FireflyError::EmptyStimulus { .. }));
    }
}

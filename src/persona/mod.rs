//! Persona records and the prompts built from them.
//!
//! # Architecture
//!
//! ```text
//! PersonaConfig (demographics + behavioral tags)
//!   ↓  PersonaPromptBuilder
//! identity prompt (first-person character description)
//!   +  PollContext::render (historical poll insights)
//!   +  StimulusConfig::get_prompt (the question)
//!   ↓
//! LLM request
//! ```

pub mod config;
pub mod poll_context;
pub mod prompt_builder;
pub mod stimulus;

// Re-exports
pub use config::{
    age_bracket, BehavioralTrait, DemographicField, Demographics, Education, Gender,
    IncomeBracket, LocationType, MaritalStatus, PersonaConfig, RaceEthnicity, ValidationErrors,
};
pub use poll_context::{PollContext, PollContextEntry, PollInsight, PollStatistic};
pub use prompt_builder::{generation, political_leaning, PersonaPromptBuilder, PoliticalLeaning};
pub use stimulus::{StimulusConfig, StimulusType};

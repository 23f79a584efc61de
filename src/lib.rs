//! # persona-sim
//!
//! LLM persona simulation: census-weighted synthetic populations answer
//! survey questions through an LLM, replies are classified and aggregated,
//! and aggregate answers are checked against historical polls.
//!
//! ```text
//! population (CensusPersonaGenerator)
//!   → persona prompt (PersonaPromptBuilder + PollContext)
//!   → llms (BaseLLM providers behind PersonaLlmAdapter)
//!   → handler / firefly (one persona, one answer)
//!   → simulation (batched runs, classification, statistics)
//!   → validation (accuracy against stored polls)
//! ```

#[macro_use]
pub mod utilities;

pub mod cli;
pub mod firefly;
pub mod handler;
pub mod llms;
pub mod persona;
pub mod polls;
pub mod population;
pub mod simulation;
pub mod types;
pub mod validation;

// Re-exports
pub use firefly::{FireflyError, FireflyResponse, PersonaFirefly};
pub use handler::{HandlerError, PersonaHandler, PersonaReply};
pub use llms::{create_llm, BaseLLM, LlmProvider, MockLLM, PersonaLlmAdapter};
pub use persona::{PersonaConfig, PersonaPromptBuilder, PollContext, StimulusConfig};
pub use polls::{PollDataSelector, PollDatabase, PollRecord};
pub use population::{CensusPersonaGenerator, PopulationConstraints, PopulationValidation};
pub use simulation::{
    PersonaSimulation, ResponseCategory, ResponseClassifier, ScenarioConfig, ScenarioType,
    SimulationResults,
};
pub use utilities::config::AppConfig;
pub use validation::{AccuracyReport, ValidationDatabase, ValidationFramework, ValidationResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

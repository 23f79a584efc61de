//! Scenario simulation across persona populations.
//!
//! - [`scenario`]: what is asked
//! - [`classifier`]: free text to [`ResponseCategory`]
//! - [`engine`]: batched runs and aggregation
//! - [`stats`]: confidence intervals and the significance heuristic

pub mod classifier;
pub mod engine;
pub mod scenario;
pub mod stats;

pub use classifier::{ResponseCategory, ResponseClassifier};
pub use engine::{
    print_results_summary, PersonaResponse, PersonaSimulation, SimulationError,
    SimulationMetadata, SimulationResults, DEFAULT_MAX_CONCURRENT,
};
pub use scenario::{ScenarioConfig, ScenarioType};

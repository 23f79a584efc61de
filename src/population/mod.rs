//! Census-weighted population generation.
//!
//! [`CensusPersonaGenerator`] draws personas whose demographic mix follows
//! [`CensusData`], optionally assigns correlated behavioral traits, and can
//! score a population against the census targets.

pub mod behavioral;
pub mod census;
pub mod generator;

pub use behavioral::BehavioralCharacteristicEngine;
pub use census::{weighted_choice, AgeRange, CensusData};
pub use generator::{
    validate_population_accuracy, CensusPersonaGenerator, GenerationRecord, PopulationConstraints,
    PopulationError, PopulationValidation,
};

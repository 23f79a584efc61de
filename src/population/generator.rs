//! Census-proportional persona generation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persona::config::{
    DemographicField, Education, Gender, IncomeBracket, LocationType, MaritalStatus,
    PersonaConfig, RaceEthnicity, MAX_AGE, MIN_AGE,
};
use crate::population::behavioral::BehavioralCharacteristicEngine;
use crate::population::census::{weighted_choice, AgeRange, CensusData};

/// Accuracy below which a field is reported as a representation gap.
pub const GAP_THRESHOLD: f64 = 0.8;

/// Overall score below which a larger sample is recommended.
pub const RECOMMEND_THRESHOLD: f64 = 0.9;

#[derive(Debug, Error)]
pub enum PopulationError {
    #[error("Invalid age constraint: min {min} is greater than max {max}")]
    InvalidAgeRange { min: u8, max: u8 },
}

// ---------------------------------------------------------------------------
// Constraints and records
// ---------------------------------------------------------------------------

/// Optional restrictions on generated demographics.
///
/// Categorical lists keep only the listed values: the census weights of the
/// listed values are renormalized, or the values are drawn uniformly when
/// none of them has a census weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConstraints {
    pub age_min: Option<u8>,
    pub age_max: Option<u8>,
    pub race_ethnicity: Option<Vec<RaceEthnicity>>,
    pub gender: Option<Vec<Gender>>,
    pub education: Option<Vec<Education>>,
    pub location_type: Option<Vec<LocationType>>,
    pub income: Option<Vec<IncomeBracket>>,
    pub marital_status: Option<Vec<MaritalStatus>>,
}

impl PopulationConstraints {
    /// Effective inclusive age bounds.
    pub fn age_bounds(&self) -> Result<(u8, u8), PopulationError> {
        let min = self.age_min.unwrap_or(MIN_AGE).max(MIN_AGE);
        let max = self.age_max.unwrap_or(MAX_AGE).min(MAX_AGE);
        if min > max {
            return Err(PopulationError::InvalidAgeRange { min, max });
        }
        Ok((min, max))
    }
}

/// One call to [`CensusPersonaGenerator::generate_representative_population`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub timestamp: DateTime<Utc>,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<PopulationConstraints>,
    pub behavioral_included: bool,
}

/// How closely a population matches the census targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationValidation {
    pub target_size: usize,
    pub actual_size: usize,
    /// Per-field accuracy, `1 - mean |actual - target|` over target categories.
    pub demographic_accuracy: BTreeMap<DemographicField, f64>,
    pub representation_gaps: Vec<String>,
    pub validation_score: f64,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Name and occupation tables
// ---------------------------------------------------------------------------

fn first_names(race: RaceEthnicity, gender: Gender) -> Option<&'static [&'static str]> {
    use Gender::*;
    use RaceEthnicity::*;
    let names: &'static [&'static str] = match (race, gender) {
        (Hispanic, Female) => &["Maria", "Ana", "Sofia", "Carmen", "Elena", "Isabel"],
        (Hispanic, Male) => &["Carlos", "Miguel", "Jose", "Luis", "Diego", "Antonio"],
        (Black, Female) => &["Keisha", "Tanya", "Nicole", "Jasmine", "Alicia", "Denise"],
        (Black, Male) => &["Marcus", "Damon", "Jerome", "Kevin", "Tyrone", "Andre"],
        (Asian, Female) => &["Ashley", "Jennifer", "Michelle", "Lisa", "Amy", "Catherine"],
        (Asian, Male) => &["David", "Michael", "Kevin", "Daniel", "Steven", "Andrew"],
        (White, Female) => &["Sarah", "Jennifer", "Emily", "Jessica", "Ashley", "Amanda"],
        (White, Male) => &["Michael", "David", "James", "Robert", "John", "William"],
        _ => return None,
    };
    Some(names)
}

fn last_names(race: RaceEthnicity) -> &'static [&'static str] {
    match race {
        RaceEthnicity::Hispanic => &["Rodriguez", "Garcia", "Martinez", "Lopez", "Hernandez", "Perez"],
        RaceEthnicity::Black => &["Johnson", "Williams", "Brown", "Jones", "Davis", "Miller"],
        RaceEthnicity::Asian => &["Chen", "Wang", "Kim", "Lee", "Liu", "Park"],
        _ => &["Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia"],
    }
}

fn occupations(education: Education) -> &'static [&'static str] {
    match education {
        Education::NoHighSchool => &[
            "retail worker",
            "food service worker",
            "warehouse worker",
            "cleaner",
            "security guard",
        ],
        Education::HighSchool => &[
            "mechanic",
            "administrative assistant",
            "sales associate",
            "truck driver",
            "factory worker",
        ],
        Education::SomeCollege => &[
            "technician",
            "customer service rep",
            "bank teller",
            "police officer",
            "paramedic",
        ],
        Education::College => &[
            "teacher",
            "accountant",
            "marketing coordinator",
            "nurse",
            "social worker",
        ],
        Education::Graduate => &["lawyer", "doctor", "professor", "engineer", "consultant"],
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// CensusPersonaGenerator
// ---------------------------------------------------------------------------

/// Generates demographically representative populations.
#[derive(Debug)]
pub struct CensusPersonaGenerator {
    rng: StdRng,
    behavioral_engine: BehavioralCharacteristicEngine,
    generation_history: Vec<GenerationRecord>,
}

impl CensusPersonaGenerator {
    /// A generator seeded with `seed`, or from OS entropy when `None`.
    /// The same seed always yields the same populations.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            behavioral_engine: BehavioralCharacteristicEngine::new(),
            generation_history: Vec::new(),
        }
    }

    pub fn generation_history(&self) -> &[GenerationRecord] {
        &self.generation_history
    }

    /// Generate `size` personas following census proportions.
    pub fn generate_representative_population(
        &mut self,
        size: usize,
        include_behavioral_characteristics: bool,
        constraints: Option<&PopulationConstraints>,
    ) -> Result<Vec<PersonaConfig>, PopulationError> {
        let default_constraints = PopulationConstraints::default();
        let active = constraints.unwrap_or(&default_constraints);
        let age_bounds = active.age_bounds()?;

        log::info!("Generating {} census-proportional personas", size);
        let mut personas = Vec::with_capacity(size);
        for i in 0..size {
            if i > 0 && i % 100 == 0 {
                log::debug!("Generated {}/{} personas", i, size);
            }
            let mut persona = self.generate_single_persona(active, age_bounds);
            if include_behavioral_characteristics {
                self.behavioral_engine
                    .assign_behavioral_characteristics(&mut persona, &mut self.rng);
            }
            personas.push(persona);
        }
        log::info!("Generated {} personas", personas.len());

        self.generation_history.push(GenerationRecord {
            timestamp: Utc::now(),
            size: personas.len(),
            constraints: constraints.cloned(),
            behavioral_included: include_behavioral_characteristics,
        });
        Ok(personas)
    }

    fn generate_single_persona(
        &mut self,
        constraints: &PopulationConstraints,
        (age_min, age_max): (u8, u8),
    ) -> PersonaConfig {
        let age = self.sample_age(age_min, age_max);
        let race = self.sample(CensusData::RACE_ETHNICITY, constraints.race_ethnicity.as_deref());
        let gender = self.sample(CensusData::GENDER, constraints.gender.as_deref());
        let education = self.sample(CensusData::EDUCATION, constraints.education.as_deref());
        let location = self.sample(CensusData::LOCATION_TYPE, constraints.location_type.as_deref());
        let income = self.sample(CensusData::INCOME, constraints.income.as_deref());
        let marital = self.sample(CensusData::MARITAL_STATUS, constraints.marital_status.as_deref());

        let name = self.generate_name(race, gender);
        let occupation = self.generate_occupation(education, age);
        let children = self.generate_children(age, marital);

        PersonaConfig::new(name, age, race, gender, education, location, income)
            .with_marital_status(marital)
            .with_children(children)
            .with_occupation(occupation)
    }

    fn sample_age(&mut self, age_min: u8, age_max: u8) -> u8 {
        let ranges: Vec<(AgeRange, f64)> = CensusData::AGE
            .iter()
            .filter_map(|(range, weight)| range.clamp_to(age_min, age_max).map(|r| (r, *weight)))
            .collect();
        match weighted_choice(&mut self.rng, &ranges) {
            Some(range) => self.rng.gen_range(range.min..=range.max),
            None => self.rng.gen_range(age_min..=age_max),
        }
    }

    fn sample<T>(&mut self, table: &[(T, f64)], allowed: Option<&[T]>) -> T
    where
        T: Copy + PartialEq,
    {
        let fallback = table[0].0;
        let Some(allowed) = allowed.filter(|a| !a.is_empty()) else {
            return weighted_choice(&mut self.rng, table).copied().unwrap_or(fallback);
        };
        let filtered: Vec<(T, f64)> = table
            .iter()
            .filter(|(value, _)| allowed.contains(value))
            .copied()
            .collect();
        if filtered.is_empty() {
            return allowed.choose(&mut self.rng).copied().unwrap_or(fallback);
        }
        weighted_choice(&mut self.rng, &filtered)
            .copied()
            .unwrap_or(fallback)
    }

    fn generate_name(&mut self, race: RaceEthnicity, gender: Gender) -> String {
        let first = match first_names(race, gender)
            .or_else(|| first_names(RaceEthnicity::White, gender))
        {
            Some(pool) => pick(&mut self.rng, pool),
            // No gendered list: draw from both.
            None => {
                let pool_race = if first_names(race, Gender::Female).is_some() {
                    race
                } else {
                    RaceEthnicity::White
                };
                let mut pool: Vec<&'static str> = Vec::new();
                for g in [Gender::Female, Gender::Male] {
                    pool.extend(first_names(pool_race, g).unwrap_or_default());
                }
                pick(&mut self.rng, &pool)
            }
        };
        let last = pick(&mut self.rng, last_names(race));
        format!("{} {}", first, last)
    }

    fn generate_occupation(&mut self, education: Education, age: u8) -> String {
        if age >= 65 || (age >= 60 && self.rng.gen::<f64>() < 0.3) {
            return "retired".to_string();
        }
        pick(&mut self.rng, occupations(education)).to_string()
    }

    fn generate_children(&mut self, age: u8, marital: MaritalStatus) -> u8 {
        let married = marital == MaritalStatus::Married;
        if age < 25 {
            if self.rng.gen::<f64>() < 0.8 {
                return 0;
            }
            return self.rng.gen_range(0..=1);
        }
        let table: &[(u8, f64)] = match (age, married) {
            (25..=34, true) => &[(0, 0.3), (1, 0.4), (2, 0.3)],
            (25..=34, false) => &[(0, 0.7), (1, 0.3)],
            (35..=49, true) => &[(0, 0.2), (1, 0.3), (2, 0.4), (3, 0.1)],
            (35..=49, false) => &[(0, 0.5), (1, 0.3), (2, 0.2)],
            (_, true) => &[(0, 0.3), (1, 0.2), (2, 0.3), (3, 0.2)],
            (_, false) => &[(0, 0.4), (1, 0.3), (2, 0.3)],
        };
        weighted_choice(&mut self.rng, table).copied().unwrap_or(0)
    }

    /// Compare the demographic mix of `personas` with the census targets.
    pub fn validate_population_accuracy(&self, personas: &[PersonaConfig]) -> PopulationValidation {
        validate_population_accuracy(personas)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Share of each value of `field` in `personas`.
pub fn actual_distribution(personas: &[PersonaConfig], field: DemographicField) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for persona in personas {
        *counts
            .entry(persona.demographics().field_value(field))
            .or_default() += 1;
    }
    let total = personas.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(k, v)| (k, v as f64 / total))
        .collect()
}

/// `1 - mean |actual - target|` over the target categories, floored at 0.
pub fn field_accuracy(actual: &HashMap<String, f64>, target: &[(String, f64)]) -> f64 {
    if target.is_empty() {
        return 1.0;
    }
    let total_error: f64 = target
        .iter()
        .map(|(key, share)| (actual.get(key).copied().unwrap_or(0.0) - share).abs())
        .sum();
    (1.0 - total_error / target.len() as f64).max(0.0)
}

/// Compare the demographic mix of `personas` with the census targets.
/// An empty population scores 0 on every field.
pub fn validate_population_accuracy(personas: &[PersonaConfig]) -> PopulationValidation {
    log::info!(
        "Validating population of {} personas against census targets",
        personas.len()
    );

    let mut accuracy = BTreeMap::new();
    for field in DemographicField::ALL {
        let score = if personas.is_empty() {
            0.0
        } else {
            let actual = actual_distribution(personas, *field);
            field_accuracy(&actual, &CensusData::target_distribution(*field))
        };
        accuracy.insert(*field, score);
    }

    let overall = accuracy.values().sum::<f64>() / accuracy.len() as f64;
    let gaps: Vec<String> = accuracy
        .iter()
        .filter(|(_, score)| **score < GAP_THRESHOLD)
        .map(|(field, score)| format!("{} representation: {:.1}% accuracy", field, score * 100.0))
        .collect();

    let mut recommendations = Vec::new();
    if overall < RECOMMEND_THRESHOLD {
        recommendations.push("Consider increasing sample size for better representation".to_string());
    }
    if !gaps.is_empty() {
        recommendations
            .push("Review demographic sampling weights for underrepresented groups".to_string());
    }

    PopulationValidation {
        target_size: personas.len(),
        actual_size: personas.len(),
        demographic_accuracy: accuracy,
        representation_gaps: gaps,
        validation_score: overall,
        recommendations,
    }
}

//! Population-wide scenario runs.
//!
//! Personas are processed in batches of `max_concurrent`. Every request in a
//! batch is awaited together; a failed persona is logged and left out of the
//! tallies. An optional pause separates batches to stay under provider rate
//! limits.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handler::{HandlerError, PersonaHandler};
use crate::llms::LlmProvider;
use crate::persona::config::{DemographicField, Demographics, PersonaConfig};
use crate::persona::poll_context::PollContext;
use crate::simulation::classifier::{ResponseCategory, ResponseClassifier};
use crate::simulation::scenario::{ScenarioConfig, ScenarioType};
use crate::simulation::stats::{confidence_interval, statistical_significance};
use crate::utilities::printer::{Printer, PrinterColor};

/// Default number of personas asked at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("No valid responses to analyze for scenario '{scenario_id}' ({attempted} attempted)")]
    NoResponses { scenario_id: String, attempted: usize },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One persona's classified reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaResponse {
    pub persona_id: String,
    pub persona_name: String,
    pub response_text: String,
    pub demographics: Demographics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    pub response_category: ResponseCategory,
    /// Sentiment score in `[-1, 1]`.
    pub confidence_score: f64,
    pub response_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetadata {
    pub scenario_type: ScenarioType,
    pub scenario_description: String,
    pub simulation_timestamp: DateTime<Utc>,
    pub total_attempted: usize,
    /// Valid responses divided by attempted personas.
    pub success_rate: f64,
    pub provider: LlmProvider,
    pub model: String,
}

/// Category shares per value of one demographic field.
pub type FieldBreakdown = BTreeMap<String, BTreeMap<ResponseCategory, f64>>;

/// Aggregated outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub scenario_id: String,
    /// Number of valid responses.
    pub total_personas: usize,
    pub response_distribution: BTreeMap<ResponseCategory, f64>,
    pub demographic_breakdowns: BTreeMap<DemographicField, FieldBreakdown>,
    /// Interval around the leading category's share.
    pub confidence_interval: (f64, f64),
    pub statistical_significance: f64,
    /// Categories in order of first appearance.
    pub response_categories: Vec<ResponseCategory>,
    pub raw_responses: Vec<PersonaResponse>,
    pub simulation_metadata: SimulationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_accuracy: Option<f64>,
}

impl SimulationResults {
    /// Leading category and its share. Ties go to the category seen first.
    pub fn main_result(&self) -> Option<(ResponseCategory, f64)> {
        let mut best: Option<(ResponseCategory, f64)> = None;
        for category in &self.response_categories {
            let share = self
                .response_distribution
                .get(category)
                .copied()
                .unwrap_or(0.0);
            if best.map_or(true, |(_, s)| share > s) {
                best = Some((*category, share));
            }
        }
        best
    }

    /// Shares keyed by category name.
    pub fn distribution_by_name(&self) -> HashMap<String, f64> {
        self.response_distribution
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PersonaSimulation
// ---------------------------------------------------------------------------

/// Runs scenarios across persona populations.
#[derive(Debug, Clone)]
pub struct PersonaSimulation {
    handler: PersonaHandler,
    classifier: ResponseClassifier,
    batch_delay: Duration,
    confidence_level: f64,
}

impl PersonaSimulation {
    pub fn new(handler: PersonaHandler) -> Self {
        Self {
            handler,
            classifier: ResponseClassifier::new(),
            batch_delay: Duration::ZERO,
            confidence_level: 0.95,
        }
    }

    /// Pause between batches.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn classifier(&self) -> &ResponseClassifier {
        &self.classifier
    }

    /// Ask every persona the scenario question and aggregate the replies.
    pub async fn run_scenario_simulation(
        &self,
        scenario: &ScenarioConfig,
        personas: &[PersonaConfig],
        poll_context: Option<&PollContext>,
        max_concurrent: usize,
    ) -> Result<SimulationResults, SimulationError> {
        let batch_size = max_concurrent.max(1);
        let total_batches = personas.len().div_ceil(batch_size);
        log::info!(
            "Starting simulation {}: {} personas, {}",
            scenario.scenario_id,
            personas.len(),
            scenario.description
        );

        let mut responses = Vec::with_capacity(personas.len());
        for (index, batch) in personas.chunks(batch_size).enumerate() {
            log::debug!(
                "Processing batch {}/{} ({} personas)",
                index + 1,
                total_batches,
                batch.len()
            );
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|persona| self.simulate_single_persona(scenario, persona, poll_context)),
            )
            .await;

            for (persona, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(response) => responses.push(response),
                    Err(e) => log::warn!("Persona simulation failed for {}: {}", persona.name, e),
                }
            }

            if index + 1 < total_batches && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        log::info!(
            "Completed simulation {} with {} valid responses",
            scenario.scenario_id,
            responses.len()
        );
        self.analyze_simulation_results(scenario, responses, personas.len())
    }

    async fn simulate_single_persona(
        &self,
        scenario: &ScenarioConfig,
        persona: &PersonaConfig,
        poll_context: Option<&PollContext>,
    ) -> Result<PersonaResponse, HandlerError> {
        let reply = self
            .handler
            .transform(&scenario.question, persona, poll_context)
            .await?;
        let text = reply.output_content;
        Ok(PersonaResponse {
            persona_id: persona.persona_id(),
            persona_name: persona.name.clone(),
            response_category: self.classifier.classify_response(&text, scenario.scenario_type),
            confidence_score: self.classifier.calculate_sentiment_score(&text),
            response_text: text,
            demographics: reply.metadata.persona_demographics,
            occupation: persona.occupation.clone(),
            response_timestamp: reply.metadata.response_timestamp,
        })
    }

    /// Tally classified responses into a [`SimulationResults`].
    pub fn analyze_simulation_results(
        &self,
        scenario: &ScenarioConfig,
        responses: Vec<PersonaResponse>,
        total_attempted: usize,
    ) -> Result<SimulationResults, SimulationError> {
        if responses.is_empty() {
            return Err(SimulationError::NoResponses {
                scenario_id: scenario.scenario_id.clone(),
                attempted: total_attempted,
            });
        }
        let total = responses.len();

        let mut categories = Vec::new();
        let mut counts: BTreeMap<ResponseCategory, usize> = BTreeMap::new();
        for r in &responses {
            if !counts.contains_key(&r.response_category) {
                categories.push(r.response_category);
            }
            *counts.entry(r.response_category).or_default() += 1;
        }
        let distribution: BTreeMap<ResponseCategory, f64> = counts
            .iter()
            .map(|(c, n)| (*c, *n as f64 / total as f64))
            .collect();

        let mut results = SimulationResults {
            scenario_id: scenario.scenario_id.clone(),
            total_personas: total,
            response_distribution: distribution,
            demographic_breakdowns: demographic_breakdowns(&responses),
            confidence_interval: (0.0, 0.0),
            statistical_significance: 0.0,
            response_categories: categories,
            raw_responses: responses,
            simulation_metadata: SimulationMetadata {
                scenario_type: scenario.scenario_type,
                scenario_description: scenario.description.clone(),
                simulation_timestamp: Utc::now(),
                total_attempted,
                success_rate: if total_attempted == 0 {
                    0.0
                } else {
                    total as f64 / total_attempted as f64
                },
                provider: self.handler.adapter().provider(),
                model: self.handler.adapter().model().to_string(),
            },
            validation_accuracy: None,
        };

        if let Some((_, share)) = results.main_result() {
            results.confidence_interval = confidence_interval(share, total, self.confidence_level);
        }
        results.statistical_significance =
            statistical_significance(results.response_distribution.values().copied(), total);
        Ok(results)
    }
}

/// Category shares within each value of each demographic field.
pub fn demographic_breakdowns(
    responses: &[PersonaResponse],
) -> BTreeMap<DemographicField, FieldBreakdown> {
    let mut breakdowns = BTreeMap::new();
    for field in DemographicField::ALL {
        let mut counts: BTreeMap<String, BTreeMap<ResponseCategory, usize>> = BTreeMap::new();
        for r in responses {
            *counts
                .entry(r.demographics.field_value(*field))
                .or_default()
                .entry(r.response_category)
                .or_default() += 1;
        }
        let shares: FieldBreakdown = counts
            .into_iter()
            .map(|(value, by_category)| {
                let total: usize = by_category.values().sum();
                let shares = by_category
                    .into_iter()
                    .map(|(c, n)| (c, n as f64 / total as f64))
                    .collect();
                (value, shares)
            })
            .collect();
        breakdowns.insert(*field, shares);
    }
    breakdowns
}

// ---------------------------------------------------------------------------
// Console summary
// ---------------------------------------------------------------------------

/// Print a human-readable summary of `results`.
pub fn print_results_summary(results: &SimulationResults, printer: &Printer) {
    printer.print(
        &format!("SIMULATION RESULTS: {}", results.scenario_id),
        PrinterColor::BoldCyan,
    );
    printer.print(&"=".repeat(60), PrinterColor::Cyan);
    printer.print_field("Total personas", &results.total_personas.to_string());
    printer.print_field(
        "Success rate",
        &format!("{:.1}%", results.simulation_metadata.success_rate * 100.0),
    );
    printer.print_field(
        "Statistical significance",
        &format!("{:.3}", results.statistical_significance),
    );

    printer.print("\nResponse distribution:", PrinterColor::BoldWhite);
    let mut sorted: Vec<_> = results.response_distribution.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(a.1));
    for (category, share) in sorted {
        printer.print_bar(category.as_str(), *share);
    }

    let (lo, hi) = results.confidence_interval;
    printer.print_field(
        "\nConfidence interval (main result)",
        &format!("{:.1}% - {:.1}%", lo * 100.0, hi * 100.0),
    );

    printer.print("\nTop demographic patterns:", PrinterColor::BoldWhite);
    for (field, breakdown) in results.demographic_breakdowns.iter().take(3) {
        printer.print(&format!("  {}", field.as_str().to_uppercase()), PrinterColor::White);
        for (value, shares) in breakdown.iter().take(3) {
            if let Some((category, share)) = shares.iter().max_by(|a, b| a.1.total_cmp(b.1)) {
                println!("    {}: {:.1}% {}", value, share * 100.0, category);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::adapter::PersonaLlmAdapter;
    use crate::llms::providers::MockLLM;
    use crate::persona::config::{Education, Gender, IncomeBracket, LocationType, RaceEthnicity};
    use crate::population::CensusPersonaGenerator;
    use std::sync::Arc;

    fn simulation(llm: MockLLM) -> PersonaSimulation {
        PersonaSimulation::new(PersonaHandler::new(PersonaLlmAdapter::new(Arc::new(llm))))
    }

    fn healthcare() -> ScenarioConfig {
        ScenarioConfig::new(
            "healthcare_policy_test",
            ScenarioType::Policy,
            "Do you support or oppose a universal healthcare system?",
        )
        .with_description("Support for universal healthcare")
    }

    fn persona(name: &str, age: u8, location: LocationType) -> PersonaConfig {
        PersonaConfig::new(
            name,
            age,
            RaceEthnicity::White,
            Gender::Female,
            Education::College,
            location,
            IncomeBracket::From50kTo75k,
        )
    }

    #[tokio::test]
    async fn test_fixed_seed_population_is_deterministic() {
        let personas = CensusPersonaGenerator::new(Some(42))
            .generate_representative_population(100, true, None)
            .unwrap();
        let llm = MockLLM::with_response("It depends on the cost, honestly.")
            .with_persona_rule("living in a rural area", "I oppose it. Too much government.")
            .with_persona_rule("living in a suburban area", "I'm not sure yet.");
        let expected_rural = personas
            .iter()
            .filter(|p| p.location_type == LocationType::Rural)
            .count();

        let results = simulation(llm.clone())
            .run_scenario_simulation(&healthcare(), &personas, None, 10)
            .await
            .unwrap();

        assert_eq!(results.total_personas, 100);
        assert_eq!(results.simulation_metadata.total_attempted, 100);
        assert_eq!(results.simulation_metadata.success_rate, 1.0);
        assert_eq!(llm.call_count(), 100);

        // Suburban "not sure" falls back to neutral, as does "depends".
        let oppose = results
            .response_distribution
            .get(&ResponseCategory::Oppose)
            .copied()
            .unwrap_or(0.0);
        assert!((oppose - expected_rural as f64 / 100.0).abs() < 1e-9);
        let neutral = results.response_distribution[&ResponseCategory::Neutral];
        assert!((neutral + oppose - 1.0).abs() < 1e-9);

        let (lo, hi) = results.confidence_interval;
        assert_eq!((lo, hi), confidence_interval(neutral, 100, 0.95));
        assert!(lo <= neutral && neutral <= hi);

        // Same seed, same answers.
        let again = CensusPersonaGenerator::new(Some(42))
            .generate_representative_population(100, true, None)
            .unwrap();
        let llm = MockLLM::with_response("It depends on the cost, honestly.")
            .with_persona_rule("living in a rural area", "I oppose it. Too much government.")
            .with_persona_rule("living in a suburban area", "I'm not sure yet.");
        let repeat = simulation(llm)
            .run_scenario_simulation(&healthcare(), &again, None, 25)
            .await
            .unwrap();
        assert_eq!(repeat.response_distribution, results.response_distribution);
        assert_eq!(repeat.confidence_interval, results.confidence_interval);
    }

    #[tokio::test]
    async fn test_breakdowns_by_location() {
        let personas = vec![
            persona("Ann Smith", 30, LocationType::Rural),
            persona("Beth Jones", 40, LocationType::Rural),
            persona("Cara Brown", 50, LocationType::Urban),
        ];
        let llm = MockLLM::with_response("I support it.")
            .with_persona_rule("living in a rural area", "I oppose it.");
        let results = simulation(llm)
            .run_scenario_simulation(&healthcare(), &personas, None, 2)
            .await
            .unwrap();

        let by_location = &results.demographic_breakdowns[&DemographicField::LocationType];
        assert_eq!(by_location["rural"][&ResponseCategory::Oppose], 1.0);
        assert_eq!(by_location["urban"][&ResponseCategory::Support], 1.0);

        let by_age = &results.demographic_breakdowns[&DemographicField::Age];
        assert!(by_age.contains_key("25-34"));
        assert!(by_age.contains_key("45-54"));

        assert_eq!(
            results.response_categories,
            vec![ResponseCategory::Oppose, ResponseCategory::Support]
        );
        assert_eq!(results.main_result().unwrap().0, ResponseCategory::Oppose);
        // fewer than 30 responses
        assert_eq!(results.statistical_significance, 0.0);
        assert_eq!(results.raw_responses[2].persona_id, "Cara Brown_50_white");
    }

    #[tokio::test]
    async fn test_failed_personas_are_skipped() {
        let mut bad = persona("Dan Lee", 40, LocationType::Urban);
        bad.age = 120;
        let personas = vec![persona("Eve Park", 30, LocationType::Urban), bad];
        let results = simulation(MockLLM::with_response("Yes."))
            .run_scenario_simulation(&healthcare(), &personas, None, 10)
            .await
            .unwrap();
        assert_eq!(results.total_personas, 1);
        assert_eq!(results.simulation_metadata.total_attempted, 2);
        assert_eq!(results.simulation_metadata.success_rate, 0.5);
    }

    #[tokio::test]
    async fn test_no_responses_is_an_error() {
        let err = simulation(MockLLM::new())
            .run_scenario_simulation(&healthcare(), &[], None, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::NoResponses { attempted: 0, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_delay_is_applied_between_batches() {
        let personas: Vec<_> = (0..3)
            .map(|i| persona(&format!("P{} Smith", i), 30 + i, LocationType::Urban))
            .collect();
        let sim = simulation(MockLLM::with_response("Maybe.")).with_batch_delay(Duration::from_secs(30));
        let started = tokio::time::Instant::now();
        let results = sim
            .run_scenario_simulation(&healthcare(), &personas, None, 1)
            .await
            .unwrap();
        // three batches, two pauses
        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(results.response_distribution[&ResponseCategory::Neutral], 1.0);
    }
}

//! Scores simulated answer distributions against historical polls.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde_json::json;
use thiserror::Error;

use crate::persona::config::{DemographicField, PersonaConfig};
use crate::polls::selector::{format_polls_for_context, PollDataSelector, DEFAULT_RECENCY_WEIGHT};
use crate::polls::storage::{PollDatabase, PollQuery};
use crate::simulation::engine::{PersonaSimulation, SimulationError, SimulationResults};
use crate::simulation::scenario::{ScenarioConfig, ScenarioType};
use crate::utilities::errors::StorageError;
use crate::validation::report::{build_accuracy_report, AccuracyReport};
use crate::validation::storage::{
    AccuracyRecord, ErrorAnalysis, ValidationDatabase, ValidationResult, ValidationTarget,
};

/// Polls smaller than this are not used as targets.
pub const DEFAULT_MIN_SAMPLE_SIZE: u32 = 500;
pub const DEFAULT_MAX_TARGETS: usize = 20;
pub const DEFAULT_VALIDATION_CONCURRENCY: usize = 5;
/// Context polls shown to personas during a validation run.
pub const VALIDATION_CONTEXT_POLLS: usize = 3;

/// Response labels folded into each compared bucket.
const CATEGORY_MAPPINGS: &[(&str, &[&str])] = &[
    ("support", &["support", "strong_support", "approve", "favor", "yes"]),
    ("oppose", &["oppose", "strong_oppose", "disapprove", "against", "no"]),
    ("neutral", &["neutral", "unsure", "undecided"]),
];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No personas supplied for validation target {validation_id}")]
    NoPersonas { validation_id: String },

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn bucket_share(distribution: &BTreeMap<String, f64>, labels: &[&str]) -> f64 {
    labels
        .iter()
        .map(|label| distribution.get(*label).copied().unwrap_or(0.0))
        .sum()
}

/// Poll slice keys name `age_range` where breakdowns use `age`.
fn breakdown_field(slice_key: &str) -> Option<DemographicField> {
    match slice_key {
        "age_range" => Some(DemographicField::Age),
        other => other.parse().ok(),
    }
}

/// Mean leading share across the values of each field the target slices on.
fn demographic_accuracy(
    results: &SimulationResults,
    target: &ValidationTarget,
) -> BTreeMap<String, f64> {
    let mut accuracy = BTreeMap::new();
    let Some(filter) = &target.demographic_filter else {
        return accuracy;
    };
    for key in filter.keys() {
        let Some(breakdown) = breakdown_field(key).and_then(|f| results.demographic_breakdowns.get(&f))
        else {
            continue;
        };
        let leading: Vec<f64> = breakdown
            .values()
            .map(|shares| shares.values().copied().fold(0.0, f64::max))
            .collect();
        let mean = if leading.is_empty() {
            0.5
        } else {
            leading.iter().sum::<f64>() / leading.len() as f64
        };
        accuracy.insert(key.clone(), mean);
    }
    accuracy
}

/// Compare a simulation to its target.
///
/// Accuracy is the mean over the support, oppose and neutral buckets of
/// `max(0, 1 - |predicted - actual|)`. Calibration is
/// `min(1, significance / accuracy)`, or 0.5 when accuracy is zero.
pub fn calculate_validation_accuracy(
    target: &ValidationTarget,
    results: &SimulationResults,
    now: DateTime<Utc>,
) -> ValidationResult {
    let predicted: BTreeMap<String, f64> = results.distribution_by_name().into_iter().collect();
    let actual = &target.expected_results;

    let bucket_scores: Vec<f64> = CATEGORY_MAPPINGS
        .iter()
        .map(|(_, labels)| {
            let error = (bucket_share(&predicted, labels) - bucket_share(actual, labels)).abs();
            (1.0 - error).max(0.0)
        })
        .collect();
    let accuracy = bucket_scores.iter().sum::<f64>() / bucket_scores.len() as f64;

    let category_errors: BTreeMap<String, f64> = actual
        .iter()
        .map(|(label, share)| {
            let predicted_share = predicted.get(label).copied().unwrap_or(0.0);
            (label.clone(), predicted_share - share)
        })
        .collect();
    let error_analysis = ErrorAnalysis {
        largest_error: category_errors.values().map(|e| e.abs()).fold(0.0, f64::max),
        category_errors,
        sample_size_difference: results.total_personas as i64
            - target.source_poll.sample_size as i64,
    };

    let confidence_calibration = if accuracy > 0.0 {
        (results.statistical_significance / accuracy).min(1.0)
    } else {
        0.5
    };

    ValidationResult {
        validation_id: target.validation_id.clone(),
        scenario_id: results.scenario_id.clone(),
        topic: target.source_poll.topic.clone(),
        demographic_accuracy: demographic_accuracy(results, target),
        predicted_results: predicted,
        actual_results: actual.clone(),
        accuracy_score: accuracy,
        error_analysis,
        confidence_calibration,
        validation_timestamp: now,
    }
}

// ---------------------------------------------------------------------------
// ValidationFramework
// ---------------------------------------------------------------------------

/// Store one target per qualifying poll, newest first.
fn store_targets(
    poll_database: &PollDatabase,
    validation_database: &ValidationDatabase,
    topic_filter: Option<&str>,
    min_sample_size: u32,
    max_targets: usize,
) -> Result<Vec<ValidationTarget>, StorageError> {
    let query = PollQuery {
        topic: topic_filter.map(str::to_string),
        ..PollQuery::default()
    };
    let now = Utc::now().trunc_subsecs(6);
    let mut targets = Vec::new();
    for poll in poll_database.query_polls(&query)? {
        if targets.len() >= max_targets {
            break;
        }
        if poll.sample_size < min_sample_size {
            continue;
        }
        let target = ValidationTarget::from_poll(poll, now);
        validation_database.add_validation_target(&target)?;
        targets.push(target);
    }
    log::info!("Created {} validation targets", targets.len());
    Ok(targets)
}

/// Runs validation simulations and keeps their results.
#[derive(Debug, Clone)]
pub struct ValidationFramework {
    simulation: PersonaSimulation,
    poll_database: PollDatabase,
    validation_database: ValidationDatabase,
    validation_targets: Vec<ValidationTarget>,
    context_polls: usize,
}

impl ValidationFramework {
    pub fn new(
        simulation: PersonaSimulation,
        poll_database: PollDatabase,
        validation_database: ValidationDatabase,
    ) -> Self {
        Self {
            simulation,
            poll_database,
            validation_database,
            validation_targets: Vec::new(),
            context_polls: VALIDATION_CONTEXT_POLLS,
        }
    }

    /// Number of context polls given to personas (0 disables context).
    pub fn with_context_polls(mut self, n: usize) -> Self {
        self.context_polls = n;
        self
    }

    pub fn validation_targets(&self) -> &[ValidationTarget] {
        &self.validation_targets
    }

    pub fn validation_database(&self) -> &ValidationDatabase {
        &self.validation_database
    }

    /// Turn stored polls (newest first) into targets, skipping polls with
    /// fewer than `min_sample_size` respondents.
    pub fn create_validation_targets_from_polls(
        &mut self,
        topic_filter: Option<&str>,
        min_sample_size: u32,
        max_targets: usize,
    ) -> Result<Vec<ValidationTarget>, StorageError> {
        let targets = store_targets(
            &self.poll_database,
            &self.validation_database,
            topic_filter,
            min_sample_size,
            max_targets,
        )?;
        self.validation_targets.extend(targets.iter().cloned());
        Ok(targets)
    }

    /// [`create_validation_targets_from_polls`](Self::create_validation_targets_from_polls)
    /// on the blocking thread pool.
    pub async fn acreate_validation_targets_from_polls(
        &mut self,
        topic_filter: Option<String>,
        min_sample_size: u32,
        max_targets: usize,
    ) -> Result<Vec<ValidationTarget>, StorageError> {
        let polls = self.poll_database.clone();
        let validation = self.validation_database.clone();
        let targets = tokio::task::spawn_blocking(move || {
            store_targets(
                &polls,
                &validation,
                topic_filter.as_deref(),
                min_sample_size,
                max_targets,
            )
        })
        .await
        .map_err(|e| StorageError::Task {
            message: e.to_string(),
        })??;
        self.validation_targets.extend(targets.iter().cloned());
        Ok(targets)
    }

    /// Target built from one stored poll.
    pub fn target_for_poll(&self, poll_id: &str) -> Result<ValidationTarget, StorageError> {
        let poll = self
            .poll_database
            .get_poll(poll_id)?
            .ok_or_else(|| StorageError::NotFound {
                id: poll_id.to_string(),
            })?;
        Ok(ValidationTarget::from_poll(poll, Utc::now().trunc_subsecs(6)))
    }

    /// Ask `personas` the target poll's question and score the answers.
    /// The target poll itself is kept out of the context personas see.
    pub async fn validate_against_target(
        &self,
        target: &ValidationTarget,
        personas: &[PersonaConfig],
        max_concurrent: usize,
    ) -> Result<ValidationResult, ValidationError> {
        let Some(first) = personas.first() else {
            return Err(ValidationError::NoPersonas {
                validation_id: target.validation_id.clone(),
            });
        };
        log::info!("Validating against target {}", target.validation_id);

        let poll = &target.source_poll;
        let scenario = ScenarioConfig::new(
            format!("validation_{}", target.validation_id),
            ScenarioType::Validation,
            poll.question.clone(),
        )
        .with_description(format!("Validation test for {}", poll.topic))
        .with_context("validation", json!(true))
        .with_context("original_poll", json!(poll.poll_id));

        let context = if self.context_polls > 0 {
            let selector = PollDataSelector::new(self.poll_database.clone());
            let mut ranked = selector
                .arank_relevant_polls(
                    &scenario.description,
                    first,
                    self.context_polls + 1,
                    DEFAULT_RECENCY_WEIGHT,
                )
                .await?;
            ranked.retain(|scored| scored.poll.poll_id != poll.poll_id);
            ranked.truncate(self.context_polls);
            Some(format_polls_for_context(&ranked))
        } else {
            None
        };

        let results = self
            .simulation
            .run_scenario_simulation(&scenario, personas, context.as_ref(), max_concurrent)
            .await?;

        let now = Utc::now().trunc_subsecs(6);
        let result = calculate_validation_accuracy(target, &results, now);
        let record = AccuracyRecord {
            date: now.format("%Y-%m-%d").to_string(),
            topic: Some(result.topic.clone()),
            demographic_group: None,
            accuracy_score: result.accuracy_score,
            sample_size: Some(results.total_personas as u32),
            notes: Some(result.validation_id.clone()),
        };
        Ok(self
            .validation_database
            .asave_validation(result, record)
            .await?)
    }

    /// Validate against up to `max_targets` targets, creating them from the
    /// poll store first if none exist. Failed validations are logged and
    /// skipped.
    pub async fn run_comprehensive_validation(
        &mut self,
        personas: &[PersonaConfig],
        max_targets: usize,
        max_concurrent: usize,
    ) -> Result<Vec<ValidationResult>, StorageError> {
        log::info!(
            "Running comprehensive validation with {} personas",
            personas.len()
        );
        if self.validation_targets.is_empty() {
            self.acreate_validation_targets_from_polls(None, DEFAULT_MIN_SAMPLE_SIZE, max_targets)
                .await?;
        }

        let targets: Vec<ValidationTarget> = self
            .validation_targets
            .iter()
            .take(max_targets)
            .cloned()
            .collect();
        let mut results = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            log::debug!("Validation {}/{}", i + 1, targets.len());
            match self
                .validate_against_target(target, personas, max_concurrent)
                .await
            {
                Ok(result) => {
                    log::info!(
                        "{}: accuracy {:.3}",
                        result.validation_id,
                        result.accuracy_score
                    );
                    results.push(result);
                }
                Err(e) => log::warn!("Validation {} failed: {}", target.validation_id, e),
            }
        }
        Ok(results)
    }

    /// Accuracy report over results from the last `days` days.
    pub fn generate_accuracy_report(&self, days: i64) -> Result<AccuracyReport, StorageError> {
        let history = self.validation_database.get_accuracy_history(days)?;
        if history.is_empty() {
            log::warn!("No validation data in the last {} days", days);
        }
        Ok(build_accuracy_report(&history, Utc::now()))
    }
}

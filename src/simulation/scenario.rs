//! Scenario definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

string_enum! {
    /// Kind of scenario; decides the classifier fallback.
    pub enum ScenarioType {
        Policy => "policy",
        Product => "product",
        Economic => "economic",
        Crisis => "crisis",
        Validation => "validation",
    }
}

impl Default for ScenarioType {
    fn default() -> Self {
        Self::Policy
    }
}

/// One question posed to a whole population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub scenario_id: String,
    #[serde(default)]
    pub scenario_type: ScenarioType,
    #[serde(default)]
    pub description: String,
    /// The question each persona answers.
    pub question: String,
    /// Free-form background (timing, policy scope, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_demographics: Option<Vec<String>>,
    /// Categories a validation run expects to see.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcomes: Option<Vec<String>>,
}

impl ScenarioConfig {
    pub fn new(
        scenario_id: impl Into<String>,
        scenario_type: ScenarioType,
        question: impl Into<String>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            scenario_type,
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_expected_outcomes(mut self, outcomes: Vec<String>) -> Self {
        self.expected_outcomes = Some(outcomes);
        self
    }
}

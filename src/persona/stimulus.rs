//! Stimuli: the questions and scenarios posed to personas.

use serde::{Deserialize, Serialize};

string_enum! {
    /// Kind of stimulus, which decides the structured fields rendered.
    pub enum StimulusType {
        ProductEvaluation => "product_evaluation" | "product",
        PoliticalSurvey => "political_survey" | "political",
        GeneralQuestion => "general_question" | "general",
    }
}

impl Default for StimulusType {
    fn default() -> Self {
        Self::GeneralQuestion
    }
}

/// A standardized stimulus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusConfig {
    pub stimulus_type: StimulusType,
    pub stimulus_id: String,
    /// Main question put to the persona.
    #[serde(default)]
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub political_issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<String>,

    /// Older name for `prompt`, still accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl StimulusConfig {
    /// A general question with the given id and prompt.
    pub fn question(stimulus_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            stimulus_type: StimulusType::GeneralQuestion,
            stimulus_id: stimulus_id.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// The usable prompt: `prompt`, else `question`, else `description`.
    /// Blank strings are skipped.
    pub fn get_prompt(&self) -> Option<&str> {
        std::iter::once(Some(self.prompt.as_str()))
            .chain([self.question.as_deref(), self.description.as_deref()])
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// Prompt plus the type-specific structured fields.
    pub fn enhanced_prompt(&self) -> Option<String> {
        let base = self.get_prompt()?;
        let mut lines = vec![base.to_string()];

        match self.stimulus_type {
            StimulusType::ProductEvaluation => {
                if let Some(name) = &self.product_name {
                    lines.push(format!("Product: {}", name));
                }
                if let Some(price) = &self.price {
                    lines.push(format!("Price: {}", price));
                }
                if !self.features.is_empty() {
                    lines.push(format!("Features: {}", self.features.join(", ")));
                }
            }
            StimulusType::PoliticalSurvey => {
                if let Some(issue) = &self.political_issue {
                    lines.push(format!("Issue: {}", issue));
                }
                if let Some(proposal) = &self.proposal {
                    lines.push(format!("Proposal: {}", proposal));
                }
            }
            StimulusType::GeneralQuestion => {}
        }

        Some(lines.join("\n"))
    }
}

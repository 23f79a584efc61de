//! Poll insights injected into persona prompts.
//!
//! A [`PollContext`] is an ordered list of topic entries. Each entry is
//! either a structured statistic (leading position, confidence, source) or a
//! free-text note. [`PollContext::render`] turns it into the behavioral
//! guidance block placed between the identity prompt and the question.

use serde::{Deserialize, Serialize};

/// Structured insight derived from one historical poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollStatistic {
    /// Leading response category, e.g. "support".
    pub position: String,
    /// Share of respondents holding `position`, in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable source, e.g. "Gallup (2024)".
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl PollStatistic {
    /// Wording for how strongly the demographic leans.
    pub fn strength(&self) -> &'static str {
        if self.confidence > 0.8 {
            "strongly"
        } else if self.confidence > 0.6 {
            "moderately"
        } else {
            "somewhat"
        }
    }
}

/// One topic's insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PollInsight {
    Statistic(PollStatistic),
    Note(String),
}

/// A keyed insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollContextEntry {
    pub topic: String,
    pub insight: PollInsight,
}

/// Ordered poll insights for one persona.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollContext {
    entries: Vec<PollContextEntry>,
}

impl PollContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, topic: impl Into<String>, insight: PollInsight) {
        self.entries.push(PollContextEntry {
            topic: topic.into(),
            insight,
        });
    }

    /// Add a free-text note for `topic`.
    pub fn push_note(&mut self, topic: impl Into<String>, note: impl Into<String>) {
        self.push(topic, PollInsight::Note(note.into()));
    }

    pub fn entries(&self) -> &[PollContextEntry] {
        &self.entries
    }

    pub fn get(&self, topic: &str) -> Option<&PollInsight> {
        self.entries
            .iter()
            .find(|e| e.topic == topic)
            .map(|e| &e.insight)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the "BEHAVIORAL DATA FROM YOUR DEMOGRAPHIC GROUP" block.
    /// An empty context renders as an empty string.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut lines = vec![
            "BEHAVIORAL DATA FROM YOUR DEMOGRAPHIC GROUP:".to_string(),
            "The following polling data shows how people with your background typically respond:\n"
                .to_string(),
        ];

        for entry in &self.entries {
            let topic = entry.topic.to_uppercase();
            match &entry.insight {
                PollInsight::Statistic(stat) => {
                    lines.push(format!(
                        "• {}: Your demographic {} tends toward '{}' (source: {})",
                        topic,
                        stat.strength(),
                        stat.position,
                        stat.source
                    ));
                    if let Some(notes) = &stat.behavior_notes {
                        lines.push(format!("  - {}", notes));
                    }
                }
                PollInsight::Note(text) => lines.push(format!("• {}: {}", topic, text)),
            }
        }

        lines.push(
            "\nYou should respond authentically based on these patterns while staying true to your individual personality."
                .to_string(),
        );
        lines.push(
            "These statistics inform your likely perspectives, but you're still a unique individual with personal experiences.\n"
                .to_string(),
        );
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(position: &str, confidence: f64) -> PollStatistic {
        PollStatistic {
            position: position.into(),
            confidence,
            source: "Gallup (2024)".into(),
            behavior_notes: Some("Your demographic shows 73% support on healthcare issues".into()),
            sample_size: Some(1200),
            relevance_score: Some(0.87),
        }
    }

    #[test]
    fn test_empty_context_renders_nothing() {
        assert_eq!(PollContext::new().render(), "");
    }

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(stat("x", 0.81).strength(), "strongly");
        assert_eq!(stat("x", 0.8).strength(), "moderately");
        assert_eq!(stat("x", 0.61).strength(), "moderately");
        assert_eq!(stat("x", 0.6).strength(), "somewhat");
    }

    #[test]
    fn test_render_statistic_and_note() {
        let mut ctx = PollContext::new();
        ctx.push("healthcare", PollInsight::Statistic(stat("support", 0.73)));
        ctx.push_note("economy", "Most people like you worry about prices.");

        let text = ctx.render();
        assert!(text.starts_with("BEHAVIORAL DATA FROM YOUR DEMOGRAPHIC GROUP:\n"));
        assert!(text.contains(
            "• HEALTHCARE: Your demographic moderately tends toward 'support' (source: Gallup (2024))"
        ));
        assert!(text.contains("  - Your demographic shows 73% support on healthcare issues"));
        assert!(text.contains("• ECONOMY: Most people like you worry about prices."));
        assert!(text.ends_with("personal experiences.\n"));
    }

    #[test]
    fn test_serde_is_a_list_of_entries() {
        let mut ctx = PollContext::new();
        ctx.push_note("politics", "note");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json[0]["topic"], "politics");
        assert_eq!(json[0]["insight"], "note");
        let back: PollContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}

//! Picks the historical polls most relevant to a persona and scenario.
//!
//! Relevance score per poll:
//!
//! ```text
//! 0.4 * topic  +  0.4 * demographic match  +  w * recency  +  max(0, 0.2 - w) * sample quality
//! ```
//!
//! where `w` is the caller's recency weight. The four components are each in
//! `[0, 1]`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::persona::config::{age_bracket, PersonaConfig};
use crate::persona::poll_context::{PollContext, PollInsight, PollStatistic};
use crate::polls::storage::{PollDatabase, PollQuery, PollRecord};
use crate::utilities::errors::StorageError;
use crate::utilities::keywords::keyword_regex;

/// Topic assumed when a description names none.
pub const DEFAULT_TOPIC: &str = "politics";

/// Polls this many days old or older get no recency credit.
pub const MAX_POLL_AGE_DAYS: i64 = 5 * 365;

pub const DEFAULT_MAX_POLLS: usize = 5;
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.3;

const TOPIC_WEIGHT: f64 = 0.4;
const DEMOGRAPHIC_WEIGHT: f64 = 0.4;
/// Recency and sample quality share what is left.
const REMAINING_WEIGHT: f64 = 0.2;

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "healthcare",
        &["health", "medical", "insurance", "medicare", "medicaid", "hospital"],
    ),
    (
        "economy",
        &["economic", "economy", "job", "employment", "income", "wage", "inflation", "recession"],
    ),
    (
        "politics",
        &["election", "vote", "candidate", "political", "government", "congress"],
    ),
    (
        "education",
        &["school", "college", "university", "teacher", "student", "education"],
    ),
    (
        "technology",
        &["tech", "digital", "internet", "smartphone", "computer", "ai"],
    ),
    (
        "environment",
        &["climate", "environment", "green", "pollution", "energy", "carbon"],
    ),
    (
        "social",
        &["social", "community", "diversity", "equality", "rights", "justice"],
    ),
];

static TOPIC_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    TOPIC_KEYWORDS
        .iter()
        .map(|(topic, keywords)| (*topic, keyword_regex(keywords).unwrap()))
        .collect()
});

/// Polling age bracket for `age` (18-24, 25-34, ..., 65+).
pub fn age_range(age: u8) -> &'static str {
    age_bracket(age)
}

/// Topics mentioned in `description`, defaulting to politics.
pub fn identify_topics(description: &str) -> Vec<&'static str> {
    let topics: Vec<&'static str> = TOPIC_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(description))
        .map(|(topic, _)| *topic)
        .collect();
    if topics.is_empty() {
        vec![DEFAULT_TOPIC]
    } else {
        topics
    }
}

/// One poll query per topic in `description`, filtered to the persona's
/// demographic slices.
fn topic_queries(description: &str, persona: &PersonaConfig) -> Vec<PollQuery> {
    let filters = persona_slice_filter(persona);
    identify_topics(description)
        .into_iter()
        .map(|topic| PollQuery {
            topic: Some(topic.to_string()),
            demographic_filters: filters.clone(),
            ..PollQuery::default()
        })
        .collect()
}

/// The persona's values under the slice keys polls use.
pub fn persona_slice_filter(persona: &PersonaConfig) -> BTreeMap<String, String> {
    [
        ("age_range", age_range(persona.age).to_string()),
        ("race_ethnicity", persona.race_ethnicity.to_string()),
        ("education", persona.education.to_string()),
        ("location_type", persona.location_type.to_string()),
        ("income", persona.income.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Share of the persona's slice keys that the poll covers; 0.5 when the poll
/// slices on none of them.
pub fn demographic_match(poll: &PollRecord, persona: &PersonaConfig) -> f64 {
    let mut checked = 0usize;
    let mut matched = 0usize;
    for (key, value) in persona_slice_filter(persona) {
        if let Some(slice) = poll.demographic_slice.get(&key) {
            checked += 1;
            if slice.matches(&value) {
                matched += 1;
            }
        }
    }
    if checked == 0 {
        0.5
    } else {
        matched as f64 / checked as f64
    }
}

/// 1.0 for a poll taken on `today`, falling linearly to 0 at five years.
/// Unparseable dates score 0.5.
pub fn recency_score(poll: &PollRecord, today: NaiveDate) -> f64 {
    match poll.parsed_date() {
        Some(date) => {
            let days_old = (today - date).num_days();
            (1.0 - days_old as f64 / MAX_POLL_AGE_DAYS as f64).clamp(0.0, 1.0)
        }
        None => 0.5,
    }
}

/// A poll with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoll {
    pub poll: PollRecord,
    pub score: f64,
}

/// Canned behavioral pattern for an event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPattern {
    pub event_type: String,
    pub typical_response: String,
    pub confidence: f64,
    pub historical_examples: Vec<String>,
}

/// Chooses poll context for personas.
#[derive(Debug, Clone)]
pub struct PollDataSelector {
    db: PollDatabase,
    today: Option<NaiveDate>,
}

impl PollDataSelector {
    pub fn new(db: PollDatabase) -> Self {
        Self { db, today: None }
    }

    /// Score recency against a fixed date instead of the current one.
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn database(&self) -> &PollDatabase {
        &self.db
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Relevance of `poll` to a scenario description and persona.
    pub fn relevance_score(
        &self,
        poll: &PollRecord,
        description: &str,
        persona: &PersonaConfig,
        recency_weight: f64,
    ) -> f64 {
        let topic = if description.to_lowercase().contains(&poll.topic.to_lowercase()) {
            1.0
        } else {
            0.5
        };
        let quality = (poll.sample_size as f64 / 1000.0).min(1.0);
        let quality_weight = (REMAINING_WEIGHT - recency_weight).max(0.0);

        TOPIC_WEIGHT * topic
            + DEMOGRAPHIC_WEIGHT * demographic_match(poll, persona)
            + recency_weight * recency_score(poll, self.today())
            + quality_weight * quality
    }

    /// Polls on the description's topics that include the persona, best
    /// first, at most `max_polls`.
    pub fn rank_relevant_polls(
        &self,
        description: &str,
        persona: &PersonaConfig,
        max_polls: usize,
        recency_weight: f64,
    ) -> Result<Vec<ScoredPoll>, StorageError> {
        let mut polls = Vec::new();
        for query in topic_queries(description, persona) {
            polls.extend(self.db.query_polls(&query)?);
        }
        Ok(self.rank(polls, description, persona, max_polls, recency_weight))
    }

    /// [`rank_relevant_polls`](Self::rank_relevant_polls) with the queries
    /// run on the blocking thread pool.
    pub async fn arank_relevant_polls(
        &self,
        description: &str,
        persona: &PersonaConfig,
        max_polls: usize,
        recency_weight: f64,
    ) -> Result<Vec<ScoredPoll>, StorageError> {
        let mut polls = Vec::new();
        for query in topic_queries(description, persona) {
            polls.extend(self.db.aquery_polls(query).await?);
        }
        Ok(self.rank(polls, description, persona, max_polls, recency_weight))
    }

    fn rank(
        &self,
        polls: Vec<PollRecord>,
        description: &str,
        persona: &PersonaConfig,
        max_polls: usize,
        recency_weight: f64,
    ) -> Vec<ScoredPoll> {
        let mut scored: Vec<ScoredPoll> = polls
            .into_iter()
            .map(|poll| {
                let score = self.relevance_score(&poll, description, persona, recency_weight);
                ScoredPoll { poll, score }
            })
            .collect();
        // Stable sort keeps query order among ties.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(max_polls);
        scored
    }

    /// Top polls formatted as persona prompt context.
    pub fn select_relevant_polls(
        &self,
        description: &str,
        persona: &PersonaConfig,
        max_polls: usize,
        recency_weight: f64,
    ) -> Result<PollContext, StorageError> {
        let ranked = self.rank_relevant_polls(description, persona, max_polls, recency_weight)?;
        log::debug!(
            "Selected {} relevant polls for {}",
            ranked.len(),
            persona.name
        );
        Ok(format_polls_for_context(&ranked))
    }

    /// Typical reactions to `event_type`.
    pub fn historical_patterns(&self, event_type: &str) -> Vec<HistoricalPattern> {
        vec![HistoricalPattern {
            event_type: event_type.to_string(),
            typical_response: format!(
                "Demographic group typically shows increased concern during {} events",
                event_type
            ),
            confidence: 0.75,
            historical_examples: vec![
                "2008 financial crisis".to_string(),
                "COVID-19 pandemic".to_string(),
            ],
        }]
    }
}

/// One context entry per poll, keyed `{topic}_{n}` (or just `{topic}` when a
/// single poll was selected).
pub fn format_polls_for_context(ranked: &[ScoredPoll]) -> PollContext {
    let mut context = PollContext::new();
    for (i, ScoredPoll { poll, score }) in ranked.iter().enumerate() {
        let (position, share) = poll.main_response().unwrap_or(("neutral", 0.5));
        let key = if ranked.len() > 1 {
            format!("{}_{}", poll.topic, i + 1)
        } else {
            poll.topic.clone()
        };
        let year = poll.date.get(..4).unwrap_or(&poll.date);
        context.push(
            key,
            PollInsight::Statistic(PollStatistic {
                position: position.to_string(),
                confidence: share,
                source: format!("{} ({})", poll.source, year),
                behavior_notes: Some(format!(
                    "Your demographic shows {:.0}% {} on {} issues",
                    share * 100.0,
                    position,
                    poll.topic
                )),
                sample_size: Some(poll.sample_size),
                relevance_score: Some((score * 100.0).round() / 100.0),
            }),
        );
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::config::{Education, Gender, IncomeBracket, LocationType, RaceEthnicity};
    use crate::polls::sample::load_sample_poll_data;
    use crate::polls::storage::SliceValue;
    use tempfile::TempDir;

    fn maria() -> PersonaConfig {
        PersonaConfig::new(
            "Maria Rodriguez",
            34,
            RaceEthnicity::Hispanic,
            Gender::Female,
            Education::College,
            LocationType::Suburban,
            IncomeBracket::From50kTo75k,
        )
    }

    fn selector() -> (TempDir, PollDataSelector) {
        let dir = TempDir::new().unwrap();
        let db = PollDatabase::new(Some(dir.path().join("polls.db"))).unwrap();
        load_sample_poll_data(&db).unwrap();
        let selector = PollDataSelector::new(db)
            .with_reference_date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        (dir, selector)
    }

    #[test]
    fn test_topic_detection() {
        assert_eq!(identify_topics("Universal healthcare reform"), vec!["healthcare"]);
        assert_eq!(
            identify_topics("Inflation and the school budget"),
            vec!["economy", "education"]
        );
        assert_eq!(identify_topics("New AI rules"), vec!["technology"]);
        // "ai" must be a whole word
        assert_eq!(identify_topics("A fair plan"), vec![DEFAULT_TOPIC]);
    }

    #[test]
    fn test_age_range() {
        assert_eq!(age_range(18), "18-24");
        assert_eq!(age_range(34), "25-34");
        assert_eq!(age_range(35), "35-44");
        assert_eq!(age_range(64), "55-64");
        assert_eq!(age_range(65), "65+");
    }

    #[test]
    fn test_demographic_match() {
        let poll = PollRecord::new("p", "Gallup", "2024-01-15", "healthcare", "q", 1000)
            .with_slice("age_range", "25-34")
            .with_slice("education", "graduate")
            .with_slice("location_type", SliceValue::any())
            .with_slice("income", SliceValue::Many(vec!["50k_75k".into()]));
        // age, location and income match; education does not.
        assert_eq!(demographic_match(&poll, &maria()), 0.75);

        let unsliced = PollRecord::new("u", "Gallup", "2024-01-15", "healthcare", "q", 1000);
        assert_eq!(demographic_match(&unsliced, &maria()), 0.5);
    }

    #[test]
    fn test_recency_score() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let fresh = PollRecord::new("a", "s", "2025-01-15", "t", "q", 1);
        let old = PollRecord::new("b", "s", "2010-01-01", "t", "q", 1);
        let bad = PollRecord::new("c", "s", "sometime", "t", "q", 1);
        assert_eq!(recency_score(&fresh, today), 1.0);
        assert_eq!(recency_score(&old, today), 0.0);
        assert_eq!(recency_score(&bad, today), 0.5);
    }

    #[test]
    fn test_relevance_score_components() {
        let (_dir, selector) = selector();
        let poll = selector.database().get_poll("gallup_healthcare_2024_01").unwrap().unwrap();
        // topic 1.0, demographics 1.0 (age, education, race all match),
        // recency 1 - 366/1825, quality weight 0 at w = 0.3.
        let score = selector.relevance_score(&poll, "universal healthcare", &maria(), 0.3);
        let expected = 0.4 + 0.4 + 0.3 * (1.0 - 366.0 / 1825.0);
        assert!((score - expected).abs() < 1e-9, "{score} vs {expected}");

        // w = 0 leaves 0.2 for sample quality (1200 >= 1000 -> 1.0).
        let score = selector.relevance_score(&poll, "universal healthcare", &maria(), 0.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_select_relevant_polls_formats_context() {
        let (_dir, selector) = selector();
        let context = selector
            .select_relevant_polls(
                "Testing support for universal healthcare policy reform",
                &maria(),
                DEFAULT_MAX_POLLS,
                DEFAULT_RECENCY_WEIGHT,
            )
            .unwrap();
        assert_eq!(context.len(), 1);
        let entry = &context.entries()[0];
        assert_eq!(entry.topic, "healthcare");
        match &entry.insight {
            PollInsight::Statistic(stat) => {
                assert_eq!(stat.position, "support");
                assert_eq!(stat.confidence, 0.73);
                assert_eq!(stat.source, "Gallup (2024)");
                assert_eq!(
                    stat.behavior_notes.as_deref(),
                    Some("Your demographic shows 73% support on healthcare issues")
                );
                assert_eq!(stat.sample_size, Some(1200));
            }
            other => panic!("unexpected insight {other:?}"),
        }
    }

    #[test]
    fn test_non_matching_persona_gets_no_polls() {
        let (_dir, selector) = selector();
        let mut older = maria();
        older.age = 70;
        let context = selector
            .select_relevant_polls("healthcare", &older, 5, 0.3)
            .unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn test_multiple_polls_are_numbered() {
        let (_dir, selector) = selector();
        selector
            .database()
            .add_poll(
                &PollRecord::new("kff_2023", "KFF", "2023-06-01", "healthcare", "Medicare?", 800)
                    .with_response("support", 0.6),
            )
            .unwrap();
        let context = selector
            .select_relevant_polls("healthcare costs", &maria(), 5, 0.3)
            .unwrap();
        let keys: Vec<_> = context.entries().iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(keys, vec!["healthcare_1", "healthcare_2"]);
    }

    #[tokio::test]
    async fn test_async_ranking_matches_blocking() {
        let (_dir, selector) = selector();
        selector
            .database()
            .add_poll(
                &PollRecord::new("kff_2023", "KFF", "2023-06-01", "healthcare", "Medicare?", 800)
                    .with_response("support", 0.6),
            )
            .unwrap();
        let description = "healthcare costs and the economy";
        let blocking = selector
            .rank_relevant_polls(description, &maria(), 5, 0.3)
            .unwrap();
        let from_pool = selector
            .arank_relevant_polls(description, &maria(), 5, 0.3)
            .await
            .unwrap();
        assert!(!blocking.is_empty());
        let ids = |ranked: &[ScoredPoll]| {
            ranked.iter().map(|s| s.poll.poll_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&from_pool), ids(&blocking));
    }

    #[test]
    fn test_historical_patterns() {
        let (_dir, selector) = selector();
        let patterns = selector.historical_patterns("health");
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].typical_response.contains("during health events"));
    }
}

//! Keyword classification of free-text persona replies.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::simulation::scenario::ScenarioType;
use crate::utilities::keywords::keyword_regex;

string_enum! {
    /// Coarse position bucket for one reply.
    pub enum ResponseCategory {
        StrongSupport => "strong_support",
        StrongOppose => "strong_oppose",
        Support => "support",
        Oppose => "oppose",
        Neutral => "neutral",
        PurchaseIntent => "purchase_intent",
        NoPurchase => "no_purchase",
        Concerned => "concerned",
        Confident => "confident",
    }
}

/// Categories in scan order with their keywords. Phrases that contain a
/// weaker keyword ("absolutely not", "wouldn't buy") come first.
const CATEGORY_KEYWORDS: &[(ResponseCategory, &[&str])] = &[
    (
        ResponseCategory::StrongOppose,
        &["strongly oppose", "absolutely not", "never", "terrible"],
    ),
    (
        ResponseCategory::StrongSupport,
        &["strongly support", "definitely", "absolutely", "enthusiastic"],
    ),
    (
        ResponseCategory::NoPurchase,
        &["wouldn't buy", "would not buy", "not interested", "too expensive", "pass"],
    ),
    (
        ResponseCategory::PurchaseIntent,
        &["would buy", "interested", "purchase", "order"],
    ),
    (
        ResponseCategory::Support,
        &["support", "agree", "favor", "like", "positive", "yes", "approve"],
    ),
    (
        ResponseCategory::Oppose,
        &["oppose", "disagree", "against", "dislike", "negative", "no", "disapprove"],
    ),
    (
        ResponseCategory::Neutral,
        &["neutral", "unsure", "uncertain", "mixed", "depends", "maybe"],
    ),
    (
        ResponseCategory::Concerned,
        &["worried", "concerned", "anxious", "scared", "nervous"],
    ),
    (
        ResponseCategory::Confident,
        &["confident", "optimistic", "hopeful", "secure"],
    ),
];

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "love", "like", "positive", "support"];
const NEGATIVE_WORDS: &[&str] = &["bad", "terrible", "hate", "dislike", "negative", "oppose", "worry"];

static CATEGORY_PATTERNS: Lazy<Vec<(ResponseCategory, Regex)>> = Lazy::new(|| {
    CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| (*category, keyword_regex(keywords).unwrap()))
        .collect()
});

/// Stateless reply classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseClassifier;

impl ResponseClassifier {
    pub fn new() -> Self {
        Self
    }

    /// First category whose keywords appear in `text`, else the scenario's
    /// fallback (`no_purchase` for products, `neutral` otherwise).
    pub fn classify_response(&self, text: &str, scenario_type: ScenarioType) -> ResponseCategory {
        CATEGORY_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(category, _)| *category)
            .unwrap_or(match scenario_type {
                ScenarioType::Product => ResponseCategory::NoPurchase,
                _ => ResponseCategory::Neutral,
            })
    }

    /// Sentiment in `[-1, 1]`: `(positive - negative) / (positive + negative)`
    /// over whole words, or 0 when there are no sentiment words.
    pub fn calculate_sentiment_score(&self, text: &str) -> f64 {
        let mut positive = 0usize;
        let mut negative = 0usize;
        for raw in text.split_whitespace() {
            let word = raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            if POSITIVE_WORDS.contains(&word.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                negative += 1;
            }
        }
        let total = positive + negative;
        if total == 0 {
            return 0.0;
        }
        (positive as f64 - negative as f64) / total as f64
    }
}

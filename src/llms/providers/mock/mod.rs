//! Deterministic offline provider.
//!
//! `MockLLM` never touches the network. Replies are picked in order:
//!
//! 1. activation requests ("introduce yourself") get a self-introduction
//!    built from the `You are {name}, a {age}-year-old ...` identity line,
//!    unless disabled with [`MockLLM::without_introductions`];
//! 2. the first matching rule, where question rules look only at the text
//!    after the last `User:` marker and persona rules look at every message;
//! 3. the fixed default response, if one is set;
//! 4. a neutral canned answer.
//!
//! It backs the test suite and the CLI when no API key is configured.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::llms::base_llm::{BaseLLM, CallOptions, LLMError, LLMMessage, LLMResponse, Role};
use crate::llms::LlmProvider;
use crate::types::usage_metrics::UsageMetrics;

/// Model name reported by the mock.
pub const MOCK_MODEL: &str = "mock";

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"You are ([^,\n]+), a (\d+)-year-old [^\n]*? living in an? (\w+) area")
        .unwrap()
});

/// Where a rule looks for its needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleScope {
    Question,
    Persona,
}

#[derive(Debug, Clone)]
struct MockRule {
    needle: String,
    response: String,
    scope: RuleScope,
}

/// Offline LLM with scripted replies.
#[derive(Debug, Clone, Default)]
pub struct MockLLM {
    default_response: Option<String>,
    rules: Vec<MockRule>,
    skip_introductions: bool,
    usage: Arc<Mutex<UsageMetrics>>,
    calls: Arc<AtomicUsize>,
}

impl MockLLM {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that answers every question with `response`.
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            default_response: Some(response.into()),
            ..Self::default()
        }
    }

    /// Reply with `response` when the question contains `needle`
    /// (case-insensitive).
    pub fn with_rule(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push(MockRule {
            needle: needle.into().to_lowercase(),
            response: response.into(),
            scope: RuleScope::Question,
        });
        self
    }

    /// Reply with `response` when any message, including the persona
    /// identity, contains `needle` (case-insensitive).
    pub fn with_persona_rule(
        mut self,
        needle: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.rules.push(MockRule {
            needle: needle.into().to_lowercase(),
            response: response.into(),
            scope: RuleScope::Persona,
        });
        self
    }

    /// Treat activation requests like any other question.
    pub fn without_introductions(mut self) -> Self {
        self.skip_introductions = true;
        self
    }

    /// Number of calls answered so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn reply_for(&self, messages: &[LLMMessage]) -> String {
        let everything = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let question = match last_user.rfind("User:") {
            Some(idx) => &last_user[idx + "User:".len()..],
            None => last_user,
        };
        let question_lower = question.to_lowercase();
        let everything_lower = everything.to_lowercase();

        let identity = IDENTITY_RE.captures(&everything);

        if !self.skip_introductions && question_lower.contains("introduce yourself") {
            if let Some(caps) = &identity {
                return format!(
                    "Hi, I'm {}, a {}-year-old living in a {} area. I work hard, take care of my people, and say what I think.",
                    &caps[1], &caps[2], &caps[3]
                );
            }
        }

        for rule in &self.rules {
            let haystack = match rule.scope {
                RuleScope::Question => &question_lower,
                RuleScope::Persona => &everything_lower,
            };
            if haystack.contains(&rule.needle) {
                return rule.response.clone();
            }
        }

        if let Some(response) = &self.default_response {
            return response.clone();
        }

        match identity {
            Some(caps) => format!(
                "Well, as {} I'd say it depends on the details. I'd need to hear more before making up my mind.",
                &caps[1]
            ),
            None => "It depends on the details. I'd need to hear more before making up my mind."
                .to_string(),
        }
    }
}

fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

#[async_trait]
impl BaseLLM for MockLLM {
    fn model(&self) -> &str {
        MOCK_MODEL
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Mock
    }

    fn temperature(&self) -> Option<f64> {
        None
    }

    async fn acall(
        &self,
        messages: &[LLMMessage],
        _options: &CallOptions,
    ) -> Result<LLMResponse, LLMError> {
        let content = self.reply_for(messages);
        let prompt_tokens: i64 = messages.iter().map(|m| word_count(&m.content)).sum();
        let usage = UsageMetrics::for_request(prompt_tokens, word_count(&content));
        self.usage.lock().add_usage_metrics(&usage);
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(LLMResponse {
            content,
            model: MOCK_MODEL.to_string(),
            usage,
        })
    }

    fn token_usage_summary(&self) -> UsageMetrics {
        self.usage.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = "You are Maria Rodriguez, a 34-year-old hispanic female living in a urban area. You have a college education.";

    fn ask(llm: &MockLLM, question: &str) -> String {
        let messages = vec![
            LLMMessage::system("You are a persona simulation system."),
            LLMMessage::user(format!("{}\n\nUser: {}\n\nMaria Rodriguez:", IDENTITY, question)),
        ];
        tokio_test::block_on(llm.acall(&messages, &CallOptions::default()))
            .unwrap()
            .content
    }

    #[test]
    fn test_introduction_uses_identity() {
        let llm = MockLLM::new();
        let messages = vec![LLMMessage::user(format!(
            "{}\n\nTo confirm you understand your identity, please introduce yourself as Maria Rodriguez in 2-3 sentences.",
            IDENTITY
        ))];
        let reply = tokio_test::block_on(llm.acall(&messages, &CallOptions::default()))
            .unwrap()
            .content;
        assert!(reply.starts_with("Hi, I'm Maria Rodriguez, a 34-year-old living in a urban area."));
    }

    #[test]
    fn test_question_rules_ignore_identity_text() {
        // "college" appears in the identity but not in the question.
        let llm = MockLLM::with_response("I'm not sure.")
            .with_rule("college", "College is great.")
            .with_rule("healthcare", "I support it.");
        assert_eq!(ask(&llm, "What about Healthcare reform?"), "I support it.");
        assert_eq!(ask(&llm, "Thoughts on taxes?"), "I'm not sure.");
    }

    #[test]
    fn test_persona_rules_see_identity() {
        let llm = MockLLM::new()
            .with_persona_rule("living in a rural area", "I oppose it.")
            .with_persona_rule("living in a urban area", "I support it.");
        assert_eq!(ask(&llm, "Should we build the bridge?"), "I support it.");
    }

    #[test]
    fn test_canned_answer_and_usage() {
        let llm = MockLLM::new();
        let reply = ask(&llm, "Anything?");
        assert!(reply.contains("as Maria Rodriguez I'd say it depends"));
        assert_eq!(llm.call_count(), 1);
        let usage = llm.token_usage_summary();
        assert_eq!(usage.successful_requests, 1);
        assert!(usage.prompt_tokens > 0);
    }
}

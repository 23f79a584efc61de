//! Token usage accounting for LLM calls.

use serde::{Deserialize, Serialize};

/// Token counts accumulated across LLM calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Total number of tokens used.
    pub total_tokens: i64,
    /// Number of tokens used in prompts.
    pub prompt_tokens: i64,
    /// Number of cached prompt tokens used.
    pub cached_prompt_tokens: i64,
    /// Number of tokens used in completions.
    pub completion_tokens: i64,
    /// Number of successful requests made.
    pub successful_requests: i64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage of a single successful request.
    pub fn for_request(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            total_tokens: prompt_tokens + completion_tokens,
            prompt_tokens,
            completion_tokens,
            successful_requests: 1,
            ..Self::default()
        }
    }

    /// Add usage metrics from another `UsageMetrics`.
    pub fn add_usage_metrics(&mut self, other: &UsageMetrics) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.cached_prompt_tokens += other.cached_prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.successful_requests += other.successful_requests;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_usage_metrics() {
        let mut total = UsageMetrics::new();
        total.add_usage_metrics(&UsageMetrics::for_request(100, 40));
        total.add_usage_metrics(&UsageMetrics::for_request(50, 10));
        assert_eq!(total.prompt_tokens, 150);
        assert_eq!(total.completion_tokens, 50);
        assert_eq!(total.total_tokens, 200);
        assert_eq!(total.successful_requests, 2);
    }
}

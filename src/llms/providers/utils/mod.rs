//! HTTP plumbing shared by the remote providers.
//!
//! [`post_json_with_retry`] implements the common retry policy: transport
//! errors, 429 and 5xx responses are retried with exponential backoff; any
//! other 4xx fails immediately; a 2xx body must be valid JSON.

use std::time::Duration;

use serde_json::Value;

use crate::llms::base_llm::{BaseLLMState, LLMError};
use crate::llms::LlmProvider;

/// Delay before the first retry. Doubles on every further attempt.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest error body kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// Cut `text` to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// POST a JSON body, retrying on transient failures.
///
/// `build` is called once per attempt to produce a fresh request from the
/// shared client.
pub async fn post_json_with_retry<F>(
    provider: LlmProvider,
    state: &BaseLLMState,
    build: F,
) -> Result<Value, LLMError>
where
    F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
{
    let client = reqwest::Client::builder().timeout(state.timeout).build()?;

    let mut last_error = String::from("no attempt made");
    let mut retry_delay = INITIAL_RETRY_DELAY;

    for attempt in 0..=state.max_retries {
        if attempt > 0 {
            log::warn!(
                "{} API retry attempt {} after {:?}",
                provider,
                attempt,
                retry_delay
            );
            tokio::time::sleep(retry_delay).await;
            retry_delay *= 2;
        }

        let response = match build(&client).send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            last_error = format!("rate limited by {} API (429)", provider);
            continue;
        }

        if status.is_server_error() {
            last_error = format!("{} API server error: {}", provider, status);
            continue;
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        if !status.is_success() {
            return Err(LLMError::Api {
                provider,
                status: status.as_u16(),
                body: truncate_chars(&text, MAX_ERROR_BODY).to_string(),
            });
        }

        return serde_json::from_str(&text).map_err(|e| LLMError::InvalidResponse {
            provider,
            message: format!("{} - Body: {}", e, truncate_chars(&text, MAX_ERROR_BODY)),
        });
    }

    Err(LLMError::RetriesExhausted {
        provider,
        attempts: state.max_retries + 1,
        last_error,
    })
}

/// Read an integer token count from a JSON object.
pub fn token_count(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

//! LLM provider implementations.
//!
//! | Provider | Module | Endpoint |
//! |----------|--------|----------|
//! | OpenAI | [`openai`] | `POST {base}/chat/completions` |
//! | Anthropic | [`anthropic`] | `POST {base}/v1/messages` |
//! | Ollama | [`ollama`] | `POST {host}/api/chat` |
//! | Mock | [`mock`] | none |
//!
//! The remote providers share the retry loop in [`utils`].

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod utils;

pub use anthropic::AnthropicCompletion;
pub use mock::MockLLM;
pub use ollama::OllamaCompletion;
pub use openai::OpenAICompletion;

//! persona-sim command-line binary.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Tracing filter (default: "info,persona_sim=debug")
//! - `PERSONA_SIM_CONFIG`: YAML configuration file
//! - `PERSONA_SIM_PROVIDER`, `PERSONA_SIM_MODEL`, `PERSONA_SIM_TEMPERATURE`: LLM overrides
//! - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_HOST`: provider credentials
//! - `PERSONA_SIM_STORAGE_DIR`: database directory
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin persona-sim -- seed-polls
//! cargo run --bin persona-sim -- simulate --question "Do you support universal healthcare?"
//! ```

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Library code logs through `log`; the fmt subscriber bridges it.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,persona_sim=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("persona-sim {}", persona_sim::VERSION);
    persona_sim::cli::run().await
}

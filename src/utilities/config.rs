//! Application configuration.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then environment variables. Every section has serde defaults so a YAML
//! file only needs the keys it changes.
//!
//! ```yaml
//! llm:
//!   provider: ollama
//!   model: llama3:8b
//! simulation:
//!   max_concurrent: 5
//!   seed: 42
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llms::LlmProvider;
use crate::utilities::errors::ConfigError;
use crate::utilities::paths::db_storage_path;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV_VAR: &str = "PERSONA_SIM_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Model name; `None` uses the provider default.
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// API key; falls back to the provider's conventional env var.
    pub api_key: Option<String>,
    /// Base URL override (Ollama host, OpenAI-compatible gateway, ...).
    pub base_url: Option<String>,
    pub timeout_secs: f64,
    pub max_retries: u32,
    /// Fixed reply for the mock provider.
    pub mock_response: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Mock,
            model: None,
            temperature: 0.8,
            max_tokens: 500,
            api_key: None,
            base_url: None,
            timeout_secs: 120.0,
            max_retries: 3,
            mock_response: None,
        }
    }
}

impl LlmSettings {
    /// Request timeout, at least one second.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.timeout_secs.max(1.0)).map_err(|_| {
            ConfigError::InvalidValue {
                key: "llm.timeout_secs".into(),
                value: self.timeout_secs.to_string(),
            }
        })
    }
}

/// Population and batching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub population_size: usize,
    pub max_concurrent: usize,
    /// Pause between batches, in milliseconds.
    pub batch_delay_ms: u64,
    pub seed: Option<u64>,
    pub confidence_level: f64,
    /// Number of historical polls injected into each persona prompt.
    pub max_context_polls: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_concurrent: 10,
            batch_delay_ms: 1000,
            seed: None,
            confidence_level: 0.95,
            max_context_polls: 3,
        }
    }
}

/// Database locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the databases; `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub poll_db: String,
    pub validation_db: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            poll_db: "historical_polls.db".to_string(),
            validation_db: "validation_data.db".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub simulation: SimulationSettings,
    pub storage: StorageSettings,
}

impl AppConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.llm.timeout()?;
        Ok(config)
    }

    /// Load configuration from `path` (or `PERSONA_SIM_CONFIG`), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => {
                let content = std::fs::read_to_string(&p).map_err(|source| ConfigError::Io {
                    path: p.display().to_string(),
                    source,
                })?;
                log::debug!("Loaded configuration from {}", p.display());
                Self::from_yaml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests independent of the
    /// process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PERSONA_SIM_PROVIDER") {
            self.llm.provider = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PERSONA_SIM_PROVIDER".into(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("PERSONA_SIM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = lookup("PERSONA_SIM_TEMPERATURE") {
            self.llm.temperature = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PERSONA_SIM_TEMPERATURE".into(),
                value: v.clone(),
            })?;
        }
        if self.llm.api_key.is_none() {
            let key_var = match self.llm.provider {
                LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
                LlmProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
                LlmProvider::Ollama | LlmProvider::Mock => None,
            };
            if let Some(var) = key_var {
                self.llm.api_key = lookup(var).filter(|k| !k.is_empty());
            }
        }
        if self.llm.provider == LlmProvider::Ollama && self.llm.base_url.is_none() {
            self.llm.base_url = lookup("OLLAMA_HOST");
        }
        if let Some(v) = lookup("PERSONA_SIM_STORAGE_DIR") {
            self.storage.data_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    fn data_dir(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) => {
                let _ = std::fs::create_dir_all(dir);
                dir.clone()
            }
            None => db_storage_path(),
        }
    }

    /// Full path of the historical poll database.
    pub fn poll_db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.poll_db)
    }

    /// Full path of the validation results database.
    pub fn validation_db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.validation_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, LlmProvider::Mock);
        assert_eq!(config.llm.temperature, 0.8);
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.simulation.max_concurrent, 10);
        assert_eq!(config.simulation.confidence_level, 0.95);
        assert_eq!(config.storage.poll_db, "historical_polls.db");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "llm:\n  provider: ollama\n  model: llama3:8b\nsimulation:\n  seed: 7\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.model.as_deref(), Some("llama3:8b"));
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.max_concurrent, 10);
    }

    #[test]
    fn test_yaml_accepts_provider_alias() {
        let config = AppConfig::from_yaml_str("llm:\n  provider: claude\n").unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
    }

    #[test]
    fn test_unbounded_timeout_is_rejected() {
        let err = AppConfig::from_yaml_str("llm:\n  timeout_secs: .inf\n").unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidValue { key, .. } if key == "llm.timeout_secs"),
            "{err}"
        );

        let config = AppConfig::from_yaml_str("llm:\n  timeout_secs: 0.25\n").unwrap();
        assert_eq!(config.llm.timeout().unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config.simulation.population_size, 100);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PERSONA_SIM_PROVIDER", "openai"),
            ("PERSONA_SIM_TEMPERATURE", "0.2"),
            ("OPENAI_API_KEY", "sk-test"),
            ("PERSONA_SIM_STORAGE_DIR", "/tmp/persona-sim-test"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.storage.data_dir,
            Some(PathBuf::from("/tmp/persona-sim-test"))
        );
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|k| (k == "PERSONA_SIM_TEMPERATURE").then(|| "hot".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_db_paths_use_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        assert_eq!(config.poll_db_path(), dir.path().join("historical_polls.db"));
        assert_eq!(
            config.validation_db_path(),
            dir.path().join("validation_data.db")
        );
    }
}

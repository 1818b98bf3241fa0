//! Relay Configuration Module
//!
//! Provider endpoint, model and sampling settings. Loaded from an optional
//! YAML/JSON file, then overridden by environment:
//! - GEMINI_MODEL     -> provider.model
//! - GEMINI_BASE_URL  -> provider.base_url
//!
//! The API key itself is never part of the file; `provider.api_key_env`
//! names the variable it is read from.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::gemini::GenerationConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Overall request timeout for non-streaming calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_seconds: None,
        }
    }
}

/// Main relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Sampling for conversational turns
    #[serde(default = "GenerationConfig::chat")]
    pub chat_generation: GenerationConfig,

    /// Sampling for the structured evaluation
    #[serde(default = "GenerationConfig::evaluation")]
    pub evaluation_generation: GenerationConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            chat_generation: GenerationConfig::chat(),
            evaluation_generation: GenerationConfig::evaluation(),
        }
    }
}

impl RelayConfig {
    /// Load config from file; `.yaml`/`.yml` as YAML, anything else as JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: RelayConfig = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Optional file, then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let cfg = Self::load_from_file(p)?;
                tracing::info!("Loaded relay config from {}", p.display());
                cfg
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            let m = model.trim();
            if !m.is_empty() {
                self.provider.model = m.to_string();
            }
        }
        if let Ok(base) = std::env::var("GEMINI_BASE_URL") {
            let b = base.trim();
            if !b.is_empty() {
                self.provider.base_url = b.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model is empty".into()));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        for (name, generation) in [
            ("chat_generation", &self.chat_generation),
            ("evaluation_generation", &self.evaluation_generation),
        ] {
            if generation.max_output_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}.maxOutputTokens must be positive"
                )));
            }
            if !(0.0..=2.0).contains(&generation.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.temperature must be within 0..=2"
                )));
            }
        }
        Ok(())
    }

    /// API key from the configured env var, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.provider.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_generation_settings() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.provider.model, "gemini-1.5-flash");
        assert_eq!(cfg.chat_generation.max_output_tokens, 1024);
        assert_eq!(cfg.evaluation_generation.max_output_tokens, 2048);
        assert_eq!(cfg.chat_generation.top_k, 40);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn loads_partial_yaml() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(
            file,
            "provider:\n  model: gemini-2.0-flash\nchat_generation:\n  temperature: 0.2\n  topP: 0.9\n  topK: 20\n  maxOutputTokens: 256"
        )
        .expect("write");

        let cfg = RelayConfig::load_from_file(file.path()).expect("load yaml");
        assert_eq!(cfg.provider.model, "gemini-2.0-flash");
        assert_eq!(cfg.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.chat_generation.max_output_tokens, 256);
        assert_eq!(cfg.evaluation_generation, GenerationConfig::evaluation());
    }

    #[test]
    fn loads_json_and_rejects_invalid_values() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        write!(
            file,
            r#"{{"evaluation_generation": {{"temperature": 5.0, "topP": 0.8, "topK": 40, "maxOutputTokens": 10}}}}"#
        )
        .expect("write");

        let err = RelayConfig::load_from_file(file.path()).expect_err("temperature out of range");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RelayConfig::load_from_file("/definitely/not/here.json").expect_err("missing");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

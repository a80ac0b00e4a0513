//! Configuration (layered: code > env > TOML file > defaults).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use crate::engine::{parse_positive_usize, EngineLimits, MAX_STEPS_ENV};
use crate::error::PalaverError;
use crate::provider::ProviderKind;
use crate::relay::memory::DEFAULT_CAPACITY;
use crate::relay::InMemoryRelay;
use crate::types::GenerationSettings;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Top-level settings for an orchestrator and its parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PalaverConfig {
    /// Instructions sent ahead of every model call.
    pub system_prompt: Option<String>,
    pub limits: LimitSettings,
    pub model: ModelSettings,
    pub checkpoint: CheckpointSettings,
    pub relay: RelaySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitSettings {
    pub max_steps: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_steps: EngineLimits::default().max_steps,
        }
    }
}

/// Which model backend to talk to, and how.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ModelSettings {
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..GenerationSettings::default()
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CheckpointBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckpointSettings {
    pub backend: CheckpointBackend,
    /// Directory for the file backend; defaults to `~/.palaver/checkpoints`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelaySettings {
    /// Frames buffered per subscriber before it lags.
    pub capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PalaverConfig {
    /// Defaults overridden by environment variables (a `.env` file is loaded if present).
    pub fn from_env() -> Result<Self, PalaverError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, PalaverError> {
        toml::from_str(raw).map_err(|e| PalaverError::Configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PalaverError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PalaverError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let _ = dotenvy::dotenv();
        Self::from_toml_str(&raw)?.with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, PalaverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
        };

        if let Some(prompt) = get(&["PALAVER_SYSTEM_PROMPT"]) {
            self.system_prompt = Some(prompt);
        }
        if let Some(raw) = get(&[MAX_STEPS_ENV]) {
            self.limits.max_steps = parse_positive_usize(&raw).ok_or_else(|| {
                PalaverError::Configuration(format!("{MAX_STEPS_ENV} must be a positive integer"))
            })?;
        }

        if let Some(raw) = get(&["PALAVER_PROVIDER"]) {
            self.model.provider = ProviderKind::from_str(raw.trim()).map_err(|_| {
                PalaverError::Configuration(format!("unknown provider '{raw}'"))
            })?;
        }
        if let Some(model) = get(&["PALAVER_MODEL", "OPENAI_MODEL"]) {
            self.model.model = model;
        }
        if let Some(key) = get(&["PALAVER_API_KEY", "OPENAI_API_KEY"]) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = get(&["PALAVER_BASE_URL", "OPENAI_BASE_URL"]) {
            self.model.base_url = Some(url);
        }
        if let Some(raw) = get(&["PALAVER_TEMPERATURE"]) {
            self.model.temperature = Some(raw.trim().parse().map_err(|_| {
                PalaverError::Configuration("PALAVER_TEMPERATURE must be a number".into())
            })?);
        }
        if let Some(raw) = get(&["PALAVER_MAX_TOKENS"]) {
            self.model.max_tokens = Some(raw.trim().parse().map_err(|_| {
                PalaverError::Configuration("PALAVER_MAX_TOKENS must be a positive integer".into())
            })?);
        }

        if let Some(raw) = get(&["PALAVER_CHECKPOINT_BACKEND"]) {
            self.checkpoint.backend = CheckpointBackend::from_str(raw.trim()).map_err(|_| {
                PalaverError::Configuration(format!("unknown checkpoint backend '{raw}'"))
            })?;
        }
        if let Some(dir) = get(&["PALAVER_CHECKPOINT_DIR"]) {
            self.checkpoint.dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get(&["PALAVER_RELAY_CAPACITY"]) {
            self.relay.capacity = parse_positive_usize(&raw).ok_or_else(|| {
                PalaverError::Configuration("PALAVER_RELAY_CAPACITY must be a positive integer".into())
            })?;
        }

        Ok(self)
    }

    pub fn engine_limits(&self) -> EngineLimits {
        EngineLimits::new(self.limits.max_steps)
    }

    /// Construct the configured checkpoint store (not yet initialized).
    pub fn checkpoint_store(&self) -> Arc<dyn CheckpointStore> {
        match self.checkpoint.backend {
            CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
            CheckpointBackend::File => match &self.checkpoint.dir {
                Some(dir) => Arc::new(FileCheckpointStore::new(dir)),
                None => Arc::new(FileCheckpointStore::new_default()),
            },
        }
    }

    pub fn relay(&self) -> Arc<InMemoryRelay> {
        Arc::new(InMemoryRelay::new(self.relay.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sensible() {
        let config = PalaverConfig::default();
        assert_eq!(config.limits.max_steps, 25);
        assert_eq!(config.model.provider, ProviderKind::OpenAi);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::File);
        assert_eq!(config.relay.capacity, 256);
    }

    #[test]
    fn env_overrides_file_values() {
        let config = PalaverConfig::from_toml_str(
            r#"
            system_prompt = "from file"
            [limits]
            max_steps = 5
            [model]
            provider = "openai-compatible"
            model = "llama3"
            base_url = "http://localhost:1234/v1"
            "#,
        )
        .unwrap()
        .with_env(env(&[
            ("PALAVER_MAX_STEPS", "9"),
            ("OPENAI_API_KEY", "sk-env"),
            ("PALAVER_CHECKPOINT_BACKEND", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.system_prompt.as_deref(), Some("from file"));
        assert_eq!(config.limits.max_steps, 9);
        assert_eq!(config.model.provider, ProviderKind::OpenAiCompatible);
        assert_eq!(config.model.model, "llama3");
        assert_eq!(config.model.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
    }

    #[test]
    fn palaver_keys_win_over_openai_keys() {
        let config = PalaverConfig::default()
            .with_env(env(&[("OPENAI_MODEL", "gpt-4o"), ("PALAVER_MODEL", "gpt-4.1")]))
            .unwrap();
        assert_eq!(config.model.model, "gpt-4.1");
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let err = PalaverConfig::default()
            .with_env(env(&[("PALAVER_MAX_STEPS", "0")]))
            .unwrap_err();
        assert!(matches!(err, PalaverError::Configuration(_)));

        let err = PalaverConfig::default()
            .with_env(env(&[("PALAVER_PROVIDER", "carrier-pigeon")]))
            .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));

        assert!(PalaverConfig::from_toml_str("limits = 3").is_err());
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let mut settings = ModelSettings::default();
        settings.api_key = Some("sk-secret".into());
        assert!(!format!("{settings:?}").contains("sk-secret"));
    }
}

//! Configuration loading, validation, and management for toolloop.
//!
//! Loads configuration from `~/.toolloop/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Who executes the tool calls the model requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// The engine resolves and executes every call itself
    #[default]
    Automatic,
    /// The engine suspends and the caller supplies the results
    Manual,
}

impl std::str::FromStr for InvocationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "automatic" | "auto" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            other => Err(ConfigError::ValidationError(format!(
                "unknown invocation mode '{other}' (expected 'automatic' or 'manual')"
            ))),
        }
    }
}

/// How model output is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// One request yields one complete turn
    #[default]
    Buffered,
    /// Deltas are merged incrementally and text is forwarded as it arrives
    Streamed,
}

impl std::str::FromStr for ResponseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(Self::Buffered),
            "streamed" | "stream" | "streaming" => Ok(Self::Streamed),
            other => Err(ConfigError::ValidationError(format!(
                "unknown response mode '{other}' (expected 'buffered' or 'streamed')"
            ))),
        }
    }
}

/// The root configuration structure.
///
/// Maps directly to `~/.toolloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model requested from the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Seeds every new conversation with a system turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Tool-call cycles allowed per user submission
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub invocation_mode: InvocationMode,

    #[serde(default)]
    pub response_mode: ResponseMode,

    /// Wall-clock budget of a single tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_ms: Option<u64>,

    /// Tool calls of one turn that may run at the same time
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

fn default_model() -> String {
    "demo-model".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    5
}
fn default_max_concurrent_calls() -> usize {
    4
}

impl EngineConfig {
    /// Load configuration from the default path (~/.toolloop/config.toml),
    /// then apply environment overrides:
    /// - `TOOLLOOP_MODEL`
    /// - `TOOLLOOP_MAX_ITERATIONS`
    /// - `TOOLLOOP_MODE` (`automatic` | `manual`)
    /// - `TOOLLOOP_RESPONSE_MODE` (`buffered` | `streamed`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("TOOLLOOP_MODEL") {
            self.model = model;
        }

        if let Some(raw) = lookup("TOOLLOOP_MAX_ITERATIONS") {
            self.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "TOOLLOOP_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(raw) = lookup("TOOLLOOP_MODE") {
            self.invocation_mode = raw.parse()?;
        }

        if let Some(raw) = lookup("TOOLLOOP_RESPONSE_MODE") {
            self.response_mode = raw.parse()?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }

        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_calls must be at least 1".into(),
            ));
        }

        if self.tool_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "tool_timeout_ms must be greater than 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            system_prompt: None,
            max_iterations: default_max_iterations(),
            invocation_mode: InvocationMode::default(),
            response_mode: ResponseMode::default(),
            tool_timeout_ms: None,
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.invocation_mode, InvocationMode::Automatic);
        assert_eq!(config.response_mode, ResponseMode::Buffered);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig {
            tool_timeout_ms: Some(1500),
            system_prompt: Some("You are helpful".into()),
            ..EngineConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.tool_timeout_ms, Some(1500));
        assert_eq!(parsed.system_prompt.as_deref(), Some("You are helpful"));
        assert_eq!(parsed.model, config.model);
    }

    #[test]
    fn invalid_values_rejected() {
        let hot = EngineConfig {
            temperature: 5.0,
            ..EngineConfig::default()
        };
        assert!(hot.validate().is_err());

        let no_budget = EngineConfig {
            max_iterations: 0,
            ..EngineConfig::default()
        };
        assert!(no_budget.validate().is_err());

        let zero_timeout = EngineConfig {
            tool_timeout_ms: Some(0),
            ..EngineConfig::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, "demo-model");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gemini-pro"
max_iterations = 3
invocation_mode = "manual"
response_mode = "streamed"
tool_timeout_ms = 2000
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.invocation_mode, InvocationMode::Manual);
        assert_eq!(config.response_mode, ResponseMode::Streamed);
        assert_eq!(config.tool_timeout_ms, Some(2000));
        assert_eq!(config.max_concurrent_calls, 4);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_iterations = \"lots\"").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TOOLLOOP_MODEL", "override-model"),
            ("TOOLLOOP_MAX_ITERATIONS", "9"),
            ("TOOLLOOP_MODE", "manual"),
            ("TOOLLOOP_RESPONSE_MODE", "streaming"),
        ]);
        let mut config = EngineConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model, "override-model");
        assert_eq!(config.max_iterations, 9);
        assert_eq!(config.invocation_mode, InvocationMode::Manual);
        assert_eq!(config.response_mode, ResponseMode::Streamed);
    }

    #[test]
    fn bad_env_override_rejected() {
        let mut config = EngineConfig::default();
        let result = config.apply_env(|key| (key == "TOOLLOOP_MODE").then(|| "sometimes".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = EngineConfig::default_toml();
        assert!(toml_str.contains("demo-model"));
        assert!(toml_str.contains("max_iterations = 5"));
        assert!(toml_str.contains(r#"invocation_mode = "automatic""#));
    }
}

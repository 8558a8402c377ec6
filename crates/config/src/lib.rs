//! Configuration loading, validation, and management for Scrivener.
//!
//! Loads configuration from `~/.scrivener/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.scrivener/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for every generation call
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for drafts and revisions
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Where the project files live
    #[serde(default)]
    pub library: LibraryConfig,

    /// Sentinels that end a revision cycle
    #[serde(default)]
    pub revision: RevisionConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("library", &self.library)
            .field("revision", &self.revision)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Project directory holding synopsis, entities, outlines and chapters
    #[serde(default = "default_library_dir")]
    pub dir: PathBuf,

    /// How many recent outlines are fed back as context
    #[serde(default = "default_outline_window")]
    pub outline_window: usize,
}

fn default_library_dir() -> PathBuf {
    AppConfig::config_dir().join("library")
}
fn default_outline_window() -> usize {
    3
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: default_library_dir(),
            outline_window: default_outline_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    /// Feedback containing one of these accepts the draft
    #[serde(default = "default_accept_sentinels")]
    pub accept_sentinels: Vec<String>,

    /// Feedback containing one of these commits the draft and stops
    #[serde(default = "default_cancel_sentinels")]
    pub cancel_sentinels: Vec<String>,
}

fn default_accept_sentinels() -> Vec<String> {
    vec!["ok".into()]
}
fn default_cancel_sentinels() -> Vec<String> {
    vec!["quit".into(), "退出".into()]
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            accept_sentinels: default_accept_sentinels(),
            cancel_sentinels: default_cancel_sentinels(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.scrivener/config.toml).
    ///
    /// Environment variables override the file:
    /// - `SCRIVENER_API_KEY`, then `OPENAI_API_KEY`
    /// - `SCRIVENER_API_URL`
    /// - `SCRIVENER_MODEL`
    /// - `SCRIVENER_LIBRARY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("SCRIVENER_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("SCRIVENER_API_URL") {
            self.api_url = url;
        }
        if let Some(model) = lookup("SCRIVENER_MODEL") {
            self.model = model;
        }
        if let Some(dir) = lookup("SCRIVENER_LIBRARY") {
            self.library.dir = PathBuf::from(dir);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scrivener")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.library.outline_window == 0 {
            return Err(ConfigError::ValidationError(
                "library.outline_window must be at least 1".into(),
            ));
        }

        let blank = |v: &[String]| v.is_empty() || v.iter().any(|s| s.trim().is_empty());
        if blank(&self.revision.accept_sentinels) {
            return Err(ConfigError::ValidationError(
                "revision.accept_sentinels must be non-empty and contain no blank entries".into(),
            ));
        }
        if blank(&self.revision.cancel_sentinels) {
            return Err(ConfigError::ValidationError(
                "revision.cancel_sentinels must be non-empty and contain no blank entries".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            library: LibraryConfig::default(),
            revision: RevisionConfig::default(),
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
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.library.outline_window, 3);
        assert_eq!(config.revision.accept_sentinels, vec!["ok"]);
        assert!(config.revision.cancel_sentinels.contains(&"quit".to_string()));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.library.dir, config.library.dir);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_outline_window_rejected() {
        let mut config = AppConfig::default();
        config.library.outline_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_sentinel_rejected() {
        let mut config = AppConfig::default();
        config.revision.accept_sentinels = vec!["  ".into()];
        assert!(config.validate().is_err());
        config.revision.accept_sentinels = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"
model = "local-model"

[library]
dir = "/tmp/novel"

[revision]
accept_sentinels = ["ok", "lgtm"]
"#
        )
        .unwrap();
        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.model, "local-model");
        assert_eq!(config.library.dir, PathBuf::from("/tmp/novel"));
        assert_eq!(config.library.outline_window, 3);
        assert_eq!(config.revision.accept_sentinels, vec!["ok", "lgtm"]);
        assert_eq!(config.revision.cancel_sentinels, vec!["quit", "退出"]);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "model = [").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-fallback"),
            ("SCRIVENER_MODEL", "override-model"),
            ("SCRIVENER_LIBRARY", "/srv/library"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-fallback"));
        assert_eq!(config.model, "override-model");
        assert_eq!(config.library.dir, PathBuf::from("/srv/library"));
        assert_eq!(config.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("outline_window"));
    }
}

//! Configuration system for BotTalk
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (BOTTALK_* prefix, plus OPENAI_API_KEY)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language model provider connection
    pub llm: LlmSettings,

    /// Sampling for the "who speaks next" call
    pub selection: SelectionSettings,

    /// Sampling for the streamed message call
    pub generation: GenerationSettings,

    /// Turn-taking limits and pacing
    pub simulation: SimulationSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Data storage paths
    pub storage: StorageSettings,
}

/// Which `LanguageModel` implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
    /// Offline scripted model
    Mock,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "mock" => Ok(Provider::Mock),
            other => Err(Error::config_field_invalid(
                "llm.provider",
                format!("Unknown provider '{}'. Must be one of: openai, mock", other),
            )),
        }
    }
}

/// OpenAI-compatible provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: Provider,

    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries when establishing a request
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Turn-taking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of messages after which the simulation stops
    pub max_iterations: u32,

    /// Pause between one finished step and the next, in milliseconds
    pub step_delay_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,

    /// Append every prompt sent to the model to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_log: Option<String>,
}

/// Storage path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base data directory
    pub data_dir: String,

    /// Saved personas and topic (defaults to `<data_dir>/settings.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<String>,
}

// Default implementations

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            temperature: 0.3,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.8,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            step_delay_ms: 1000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
            prompt_log: None,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.bottalk".to_string(),
            settings_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| {
                Error::config_parse(format!("{}: {}", path.display(), e.message()), e)
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            return if path.exists() {
                Ok(Some(path))
            } else {
                Err(Error::config_not_found(path))
            };
        }

        let search_paths = [
            Some(PathBuf::from("bottalk.toml")),
            dirs::config_dir().map(|p| p.join("bottalk").join("config.toml")),
            dirs::home_dir().map(|p| p.join(".bottalk").join("config.toml")),
        ];

        for path in search_paths.into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Provider settings
        if let Ok(val) = std::env::var("BOTTALK_PROVIDER") {
            if let Ok(provider) = val.parse() {
                self.llm.provider = provider;
            }
        }
        if let Ok(val) = std::env::var("BOTTALK_BASE_URL") {
            self.llm.base_url = val;
        }
        if let Ok(val) = std::env::var("BOTTALK_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")) {
            self.llm.api_key = val;
        }
        if let Ok(val) = std::env::var("BOTTALK_MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = std::env::var("BOTTALK_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.llm.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("BOTTALK_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                self.llm.max_retries = n;
            }
        }

        // Simulation settings
        if let Ok(val) = std::env::var("BOTTALK_MAX_ITERATIONS") {
            if let Ok(n) = val.parse() {
                self.simulation.max_iterations = n;
            }
        }
        if let Ok(val) = std::env::var("BOTTALK_STEP_DELAY_MS") {
            if let Ok(n) = val.parse() {
                self.simulation.step_delay_ms = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("BOTTALK_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("BOTTALK_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("BOTTALK_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = std::env::var("BOTTALK_PROMPT_LOG") {
            self.logging.prompt_log = Some(val);
        }

        // Storage settings
        if let Ok(val) = std::env::var("BOTTALK_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("BOTTALK_SETTINGS_FILE") {
            self.storage.settings_file = Some(val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.storage.data_dir = expand_path(&self.storage.data_dir);

        for path in [
            &mut self.storage.settings_file,
            &mut self.logging.file,
            &mut self.logging.prompt_log,
        ] {
            if let Some(value) = path.as_mut() {
                *value = expand_path(value);
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider == Provider::OpenAi
            && !self.llm.base_url.starts_with("http://")
            && !self.llm.base_url.starts_with("https://")
        {
            return Err(Error::config_field_invalid(
                "llm.base_url",
                "base_url must start with http:// or https://",
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(Error::config_field_invalid("llm.model", "model cannot be empty"));
        }

        let sampling = [
            ("selection", self.selection.max_tokens, self.selection.temperature),
            ("generation", self.generation.max_tokens, self.generation.temperature),
        ];
        for (section, max_tokens, temperature) in sampling {
            if max_tokens == 0 {
                return Err(Error::config_field_invalid(
                    format!("{}.max_tokens", section),
                    "max_tokens must be greater than 0",
                ));
            }
            if !(0.0..=2.0).contains(&temperature) {
                return Err(Error::config_field_invalid(
                    format!("{}.temperature", section),
                    "temperature must be between 0.0 and 2.0",
                ));
            }
        }

        if self.simulation.max_iterations == 0 {
            return Err(Error::config_field_invalid(
                "simulation.max_iterations",
                "max_iterations must be at least 1",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Location of the saved personas and topic
    pub fn settings_path(&self) -> PathBuf {
        match self.storage.settings_file {
            Some(ref file) => PathBuf::from(file),
            None => PathBuf::from(&self.storage.data_dir).join("settings.json"),
        }
    }

    /// Copy suitable for printing, with the API key masked
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if !shown.llm.api_key.is_empty() {
            shown.llm.api_key = "********".to_string();
        }
        shown
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".bottalk")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# BotTalk Configuration

[llm]
# Provider: "openai" (any OpenAI-compatible endpoint) or "mock" (offline)
provider = "openai"

# API base URL (OpenAI, Ollama, vLLM, LM Studio, etc.)
base_url = "https://api.openai.com/v1"

# API key (or set BOTTALK_API_KEY / OPENAI_API_KEY)
api_key = ""

# Model identifier
model = "gpt-4o-mini"

# Request timeout in seconds
timeout_secs = 120

# Retries when a request cannot be established (429, 5xx, connect errors)
max_retries = 2

[selection]
# The model only has to answer with a number
max_tokens = 10
temperature = 0.3

[generation]
# About one short paragraph per message
max_tokens = 300
temperature = 0.8

[simulation]
# Messages generated before the conversation stops
max_iterations = 20

# Delay between messages in milliseconds
step_delay_ms = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log file path (comment out to disable file logging)
# file = "~/.bottalk/logs/bottalk.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

# Append every prompt sent to the model to this file
# prompt_log = "~/.bottalk/prompt_log.txt"

[storage]
# Base data directory
data_dir = "~/.bottalk"

# Saved personas and topic (defaults to <data_dir>/settings.json)
# settings_file = "~/.bottalk/settings.json"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.selection.max_tokens, 10);
        assert_eq!(config.generation.max_tokens, 300);
        assert_eq!(config.simulation.max_iterations, 20);
        assert_eq!(config.simulation.step_delay_ms, 1000);
        assert!((config.selection.temperature - 0.3).abs() < f32::EPSILON);
        assert!((config.generation.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_override() {
        env::set_var("BOTTALK_PROVIDER", "mock");
        env::set_var("BOTTALK_MAX_ITERATIONS", "5");
        env::set_var("BOTTALK_STEP_DELAY_MS", "0");

        let mut config = AppConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.llm.provider, Provider::Mock);
        assert_eq!(config.simulation.max_iterations, 5);
        assert_eq!(config.simulation.step_delay_ms, 0);

        env::remove_var("BOTTALK_PROVIDER");
        env::remove_var("BOTTALK_MAX_ITERATIONS");
        env::remove_var("BOTTALK_STEP_DELAY_MS");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" MOCK ".parse::<Provider>().unwrap(), Provider::Mock);
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut config = AppConfig::default();
        config.llm.base_url = "ftp://invalid.com".to_string();
        assert!(config.validate().is_err());

        // The mock provider never dials out
        config.llm.provider = Provider::Mock;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_sampling() {
        let mut config = AppConfig::default();
        config.generation.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.selection.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_iterations() {
        let mut config = AppConfig::default();
        config.simulation.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_path_defaults_to_data_dir() {
        let mut config = AppConfig::default();
        config.storage.data_dir = "/tmp/bottalk-data".to_string();
        assert_eq!(
            config.settings_path(),
            PathBuf::from("/tmp/bottalk-data/settings.json")
        );

        config.storage.settings_file = Some("/tmp/elsewhere.json".to_string());
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/elsewhere.json"));
    }

    #[test]
    fn test_path_expansion() {
        let mut config = AppConfig::default();
        config.logging.prompt_log = Some("~/prompts.txt".to_string());
        config.expand_paths();

        assert!(!config.storage.data_dir.contains('~'));
        assert!(!config.logging.prompt_log.unwrap().contains('~'));
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = "sk-secret".to_string();
        let shown = config.redacted();
        assert_eq!(shown.llm.api_key, "********");
        assert_eq!(config.llm.api_key, "sk-secret");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[selection]
temperature = 0.1

[simulation]
max_iterations = 4
"#,
        )
        .unwrap();

        assert_eq!(config.selection.max_tokens, 10);
        assert!((config.selection.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.generation.max_tokens, 300);
        assert_eq!(config.simulation.max_iterations, 4);
        assert_eq!(config.simulation.step_delay_ms, 1000);
    }

    #[test]
    fn test_default_config_file_parses() {
        let config: AppConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_str().unwrap();

        assert_eq!(init_config(Some(path_str), false).unwrap(), path);
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = AppConfig::load(Some("/definitely/not/here/bottalk.toml")).unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }
}

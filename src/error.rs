//! Error types for BotTalk
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for the CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for BotTalk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO and settings store errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,
    SettingsFormat = 204,

    // Provider transport errors (3xx)
    ProviderUnavailable = 300,
    ProviderTimeout = 301,
    ProviderStatus = 302,

    // Provider protocol errors (4xx)
    ProviderResponse = 400,
    EmptyCompletion = 401,

    // Conversation errors (5xx)
    RosterTooSmall = 500,
    SpeakerNotFound = 501,
    PersonaNotFound = 502,
    PersonaInvalid = 503,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// Settings or transcript could not be encoded
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Provider Errors
    // ─────────────────────────────────────────────────────────────

    /// The provider could not be reached
    #[error("Language model provider at {url} is unavailable: {message}")]
    ProviderUnavailable { url: String, message: String },

    /// The provider did not answer in time
    #[error("Request to {url} timed out after {timeout_secs}s")]
    ProviderTimeout { url: String, timeout_secs: u64 },

    /// The provider answered with a non-success status
    #[error("Provider returned HTTP {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    /// The provider answered with something we could not decode
    #[error("Malformed provider response: {message}")]
    ProviderResponse { message: String },

    /// Generation finished without producing any text
    #[error("Model produced an empty message for {persona}")]
    EmptyCompletion { persona: String },

    // ─────────────────────────────────────────────────────────────
    // Conversation Errors
    // ─────────────────────────────────────────────────────────────

    /// Fewer than two personas configured
    #[error("At least 2 personas are required to start a conversation, found {count}")]
    RosterTooSmall { count: usize },

    /// Strict alternation could not find the other participant
    #[error("No persona other than '{last_speaker}' is available to speak")]
    SpeakerNotFound { last_speaker: String },

    #[error("Persona not found: {id}")]
    PersonaNotFound { id: String },

    /// Persona setup data is incomplete
    #[error("Invalid persona: {message}")]
    PersonaInvalid { message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::SettingsFormat,

            Error::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
            Error::ProviderTimeout { .. } => ErrorCode::ProviderTimeout,
            Error::ProviderStatus { .. } => ErrorCode::ProviderStatus,
            Error::ProviderResponse { .. } => ErrorCode::ProviderResponse,
            Error::EmptyCompletion { .. } => ErrorCode::EmptyCompletion,

            Error::RosterTooSmall { .. } => ErrorCode::RosterTooSmall,
            Error::SpeakerNotFound { .. } => ErrorCode::SpeakerNotFound,
            Error::PersonaNotFound { .. } => ErrorCode::PersonaNotFound,
            Error::PersonaInvalid { .. } => ErrorCode::PersonaInvalid,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Transient provider failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ProviderUnavailable { .. } | Error::ProviderTimeout { .. } => true,
            Error::ProviderStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Rejected before any model call because the conversation setup is wrong
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::RosterTooSmall { .. }
                | Error::SpeakerNotFound { .. }
                | Error::PersonaNotFound { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => {
                Some("Run 'bottalk config init' to create a default configuration file.")
            }
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'bottalk config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => {
                Some("Review the configuration file and fix the invalid values.")
            }

            Error::ProviderUnavailable { .. } => {
                Some("Check your network connection and the [llm] base_url setting.")
            }
            Error::ProviderTimeout { .. } => Some(
                "The provider is slow to answer. Raise [llm] timeout_secs or try again later.",
            ),
            Error::ProviderStatus { status: 401 | 403, .. } => {
                Some("Set a valid API key with BOTTALK_API_KEY or OPENAI_API_KEY.")
            }
            Error::ProviderStatus { status: 404, .. } => {
                Some("The model name may be wrong. Check the [llm] model setting.")
            }

            Error::RosterTooSmall { .. } => {
                Some("Add personas with 'bottalk persona add <name> <description>'.")
            }
            Error::PersonaNotFound { .. } => {
                Some("Run 'bottalk persona list' to see the available persona ids.")
            }
            Error::PersonaInvalid { .. } => Some("Both a name and a description are required."),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    pub fn config_parse(message: impl Into<String>, source: toml::de::Error) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn provider_unavailable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn provider_status(status: u16, body: impl Into<String>) -> Self {
        Error::ProviderStatus {
            status,
            body: body.into(),
        }
    }

    pub fn provider_response(message: impl Into<String>) -> Self {
        Error::ProviderResponse {
            message: message.into(),
        }
    }

    pub fn persona_not_found(id: impl Into<String>) -> Self {
        Error::PersonaNotFound { id: id.into() }
    }

    pub fn persona_invalid(message: impl Into<String>) -> Self {
        Error::PersonaInvalid {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::ProviderUnavailable.as_str(), "E300");
        assert_eq!(ErrorCode::RosterTooSmall.as_str(), "E500");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigValidation.exit_code(), 10);
        assert_eq!(ErrorCode::SettingsFormat.exit_code(), 20);
        assert_eq!(ErrorCode::ProviderStatus.exit_code(), 30);
        assert_eq!(ErrorCode::EmptyCompletion.exit_code(), 40);
        assert_eq!(ErrorCode::RosterTooSmall.exit_code(), 50);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(Error::provider_status(429, "slow down").is_retryable());
        assert!(Error::provider_status(503, "overloaded").is_retryable());
        assert!(!Error::provider_status(400, "bad request").is_retryable());
        assert!(Error::provider_unavailable("http://x", "refused").is_retryable());
        assert!(!Error::RosterTooSmall { count: 1 }.is_retryable());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(Error::RosterTooSmall { count: 0 }.is_configuration());
        assert!(Error::SpeakerNotFound { last_speaker: "a".into() }.is_configuration());
        assert!(!Error::provider_response("garbage").is_configuration());
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::config_not_found("/test");
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::provider_status(401, "unauthorized");
        assert!(err.suggestion().unwrap().contains("OPENAI_API_KEY"));

        assert!(Error::provider_status(500, "oops").suggestion().is_none());
    }

    #[test]
    fn test_format_for_terminal() {
        let formatted = Error::RosterTooSmall { count: 1 }.format_for_terminal();
        assert!(formatted.contains("E500"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::config_not_found("/test/config.toml").format_for_log();
        assert!(formatted.contains("[E100]"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}

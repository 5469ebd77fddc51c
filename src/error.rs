//! Error types for the gas monitor
//!
//! Malformed telemetry and failed deliveries are expected conditions, not faults:
//! they surface as values the caller may log, never as panics.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Payload could not be turned into a ppm value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8")]
    NotUtf8,
    #[error("Payload '{0}' is not a number")]
    NotANumber(String),
}

/// Main error type for monitor operations
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid reading: {value} is not a finite number")]
    InvalidReading { value: f64 },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::MqttError),

    #[error("Notification error: {message}")]
    Notification { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl MonitorError {
    /// Create invalid reading error
    pub fn invalid_reading(value: f64) -> Self {
        Self::InvalidReading { value }
    }

    /// Create notification error
    pub fn notification<S: Into<String>>(message: S) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Whether the error is routine input noise rather than an operational problem
    pub fn is_bad_input(&self) -> bool {
        matches!(self, Self::InvalidReading { .. } | Self::Decode(_))
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|apikey|api_key|key|secret)[=:]\s*[^\s&]+")
        .expect("secret pattern is valid")
});

static SECRET_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("secret path pattern is valid")
});

const MAX_SANITIZED_LEN: usize = 500;

/// Redact credentials and cap length before text is logged or stored
///
/// Gateway errors from reqwest embed the full request URL, including the
/// `apikey` query parameter.
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SECRET_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_SANITIZED_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_SANITIZED_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

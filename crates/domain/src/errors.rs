//! Error types used throughout the stack
//!
//! Two families live here:
//! - [`AppError`]: what callers of the request pipeline see. Every failure of
//!   an API call is normalized into one of five [`ErrorKind`]s.
//! - [`TetherError`]: infrastructure failures (storage, keychain, config)
//!   returned by adapters and the config loader.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_common::error::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Actionable category of an API failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No connectivity, timeout or aborted connection
    Network,
    /// Expired or invalid credentials, or missing permission
    Auth,
    /// Malformed request rejected by the server
    Validation,
    /// 5xx responses
    Server,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Stable label suitable for logs and metrics
    pub fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized API failure surfaced to callers
///
/// Constructed fresh for every failure and never persisted.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), http_status: None, details: None }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Error returned when a request needs the network while offline
    pub fn offline() -> Self {
        Self::network("No internet connection")
    }

    /// Error returned by cache-only lookups that find nothing
    pub fn no_cached_data() -> Self {
        Self::network("No cached data available")
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }
}

/// Infrastructure error returned by adapters and configuration loading
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TetherError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Infrastructure failures reaching a request are reported as `Unknown`,
/// except connectivity problems which keep their `Network` kind.
impl From<TetherError> for AppError {
    fn from(err: TetherError) -> Self {
        match err {
            TetherError::Network(message) => Self::network(message),
            other => Self::unknown(other.to_string()),
        }
    }
}

impl ErrorClassification for AppError {
    fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::Server)
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ErrorKind::Network => ErrorSeverity::Warning,
            ErrorKind::Validation | ErrorKind::Server | ErrorKind::Unknown => ErrorSeverity::Error,
            ErrorKind::Auth if self.http_status.is_none() => ErrorSeverity::Critical,
            ErrorKind::Auth => ErrorSeverity::Error,
        }
    }

    /// Auth failures that did not come from a response mean the session
    /// could not be recovered.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            ErrorKind::Network => Some(Duration::from_secs(1)),
            ErrorKind::Server => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

impl ErrorClassification for TetherError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Storage(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network(_) => ErrorSeverity::Warning,
            Self::Config(_) | Self::Internal(_) => ErrorSeverity::Critical,
            Self::Storage(_) | Self::Serialization(_) | Self::Keychain(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network(_) => Some(Duration::from_secs(1)),
            Self::Storage(_) => Some(Duration::from_millis(100)),
            _ => None,
        }
    }
}

/// Result type alias for infrastructure operations
pub type Result<T> = std::result::Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_display_includes_kind() {
        let err = AppError::server("upstream exploded").with_status(502);
        assert_eq!(err.to_string(), "server error: upstream exploded");
        assert_eq!(err.http_status, Some(502));
    }

    #[test]
    fn tether_network_error_keeps_network_kind() {
        let err: AppError = TetherError::Network("dns".into()).into();
        assert_eq!(err.kind, ErrorKind::Network);

        let err: AppError = TetherError::Storage("disk full".into()).into();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.message.contains("disk full"));
    }

    #[test]
    fn classification_marks_transient_failures_retryable() {
        assert!(AppError::offline().is_retryable());
        assert!(AppError::server("503").with_status(503).is_retryable());
        assert!(!AppError::validation("bad").with_status(400).is_retryable());
        assert_eq!(AppError::offline().severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn unrecoverable_session_is_critical() {
        assert!(AppError::auth("Session expired").is_critical());
        assert!(!AppError::auth("Forbidden").with_status(403).is_critical());
        assert!(TetherError::Config("bad".into()).is_critical());
        assert!(!TetherError::Keychain("locked".into()).is_retryable());
    }

    #[test]
    fn error_kind_serializes_screaming_case() {
        let json = serde_json::to_string(&ErrorKind::Validation).unwrap();
        assert_eq!(json, "\"VALIDATION\"");
    }
}

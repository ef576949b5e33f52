//! Error types for issues-sync
//!
//! Defines one error enum covering configuration, state persistence and
//! tracker failures. Uses thiserror for ergonomic error handling.

use crate::integrations::retry::{RetryDecision, RetryableError};
use thiserror::Error;

/// Result type alias for issues-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for issues-sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Mapping store errors
    #[error("State error: {0}")]
    State(String),

    /// Parsing errors (CSV mappings, timestamps)
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Issue not found in a tracker
    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A tracker answered with an unexpected HTTP status
    #[error("{tracker} API error: HTTP {status}: {message}")]
    Tracker {
        tracker: &'static str,
        status: u16,
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Short label used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) | SyncError::Validation(_) => "config",
            SyncError::State(_) => "state",
            SyncError::Parse(_) => "parse",
            SyncError::Io(_) => "io",
            SyncError::IssueNotFound(_) => "not_found",
            SyncError::Auth(_) => "auth",
            SyncError::Tracker { .. } => "tracker",
            SyncError::Json(_) | SyncError::Toml(_) => "serialization",
            SyncError::Http(_) => "http",
            SyncError::Other(_) => "other",
        }
    }
}

impl RetryableError for SyncError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            SyncError::Tracker { status, .. } if (500..=599).contains(status) => {
                RetryDecision::Retry
            }
            SyncError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    if status.is_server_error() {
                        RetryDecision::Retry
                    } else {
                        RetryDecision::NoRetry
                    }
                } else {
                    RetryDecision::NoRetry
                }
            }
            // Client-side, validation and local failures are permanent
            _ => RetryDecision::NoRetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_error(status: u16) -> SyncError {
        SyncError::Tracker {
            tracker: "JIRA",
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_server_errors_are_retried() {
        assert_eq!(tracker_error(500).retry_decision(), RetryDecision::Retry);
        assert_eq!(tracker_error(503).retry_decision(), RetryDecision::Retry);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        assert_eq!(tracker_error(400).retry_decision(), RetryDecision::NoRetry);
        assert_eq!(tracker_error(404).retry_decision(), RetryDecision::NoRetry);
        assert_eq!(
            SyncError::Auth("bad token".to_string()).retry_decision(),
            RetryDecision::NoRetry
        );
        assert_eq!(
            SyncError::Config("missing".to_string()).retry_decision(),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn test_error_display() {
        let err = tracker_error(502);
        assert_eq!(err.to_string(), "JIRA API error: HTTP 502: boom");

        let err = SyncError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid configuration: a; b");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(tracker_error(500).kind(), "tracker");
        assert_eq!(SyncError::State("x".to_string()).kind(), "state");
    }
}

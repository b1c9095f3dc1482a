use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpError;

/// Errors raised while talking to GitHub, CrowdIn or Zendesk.
///
/// "Not found" is deliberately absent: clients report missing resources as
/// `Ok(None)` because absence is ordinary reconciliation input.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Non-retryable API failure.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 5xx or throttled response; retried with backoff.
    #[error("Transient API error ({status}): {message}")]
    Transient { status: u16, message: String },

    /// Quota exhausted.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Session expired and re-authentication did not succeed.
    #[error("Authentication required")]
    AuthRequired,

    /// Credentials were rejected outright.
    #[error("Invalid credentials for {service}")]
    InvalidCredentials { service: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A pre-translation job outlived its deadline.
    #[error("Translation job {identifier} did not finish within {waited:?}")]
    TranslationTimeout { identifier: String, waited: Duration },

    #[error("Translation build {build_id} ended with status {status}")]
    BuildFailed { build_id: u64, status: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RemoteError {
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the failure may succeed on a later attempt.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::RateLimited { .. } | Self::Network { .. }
        )
    }
}

impl From<HttpError> for RemoteError {
    fn from(err: HttpError) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// First line of an error message, for progress events and log lines.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_transient() {
        let err: RemoteError = HttpError::Transport("connection reset".into()).into();
        assert!(err.is_transient());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn timeout_is_not_transient() {
        let err = RemoteError::TranslationTimeout {
            identifier: "job-1".into(),
            waited: Duration::from_secs(1800),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("job-1"));
    }

    #[test]
    fn short_error_message_keeps_first_line() {
        let err = RemoteError::api(500, "boom\nstack");
        assert_eq!(short_error_message(&err), "API error (500): boom");
    }
}

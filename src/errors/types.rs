//! Error type definitions for the HLS monitor
//!
//! Only [`MonitorError`] is fatal to a poll cycle. Everything below the
//! playlist level degrades to fallback values and is logged instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Poll cycle errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// HTTP collaborator errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that abort a poll cycle before segment analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// The playlist URL has no scheme or host
    #[error("Invalid playlist URL: {url}")]
    InvalidUrl { url: String },

    /// Non-200 status or transport failure while fetching a playlist
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Malformed playlist body
    #[error("Failed to parse playlist {url}: {message}")]
    Parse { url: String, message: String },
}

/// Failures of the HTTP collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connect or read deadline exceeded
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// TCP/TLS/DNS level failure
    #[error("Connection failed: {url} - {message}")]
    Connect { url: String, message: String },

    /// Any other request failure (body read, redirect loop, ...)
    #[error("Request failed: {url} - {message}")]
    Request { url: String, message: String },

    /// Retryable status persisted through every attempt
    #[error("Retries exhausted: {url} - last status {status} after {attempts} attempts")]
    RetriesExhausted { url: String, status: u16, attempts: u32 },
}

/// Failures of the external media probe
#[derive(Error, Debug)]
pub enum ProbeFailure {
    /// The probe binary could not be started
    #[error("ffprobe unavailable ({command}): {message}")]
    Unavailable { command: String, message: String },

    /// The probe did not finish within its deadline
    #[error("ffprobe timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The probe exited unsuccessfully
    #[error("ffprobe exited with code {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    /// The probe output was not the expected JSON document
    #[error("Malformed ffprobe output: {0}")]
    MalformedOutput(#[from] serde_json::Error),
}

/// User-facing error object returned when a poll cycle fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollFailure {
    pub error: String,
    /// Seconds spent before the failure
    pub processing_time: f64,
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl MonitorError {
    pub fn fetch<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn parse<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Classify a reqwest error for the given URL
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: error.to_string(),
            }
        }
    }

    /// Whether a fresh attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }
}

impl PollFailure {
    pub fn new<S: Into<String>>(error: S, processing_time: f64) -> Self {
        Self {
            error: error.into(),
            processing_time,
        }
    }
}

impl std::fmt::Display for PollFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {:.2}s)", self.error, self.processing_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_failure_serializes_with_stable_field_names() {
        let failure = PollFailure::new("HTTP 404 when fetching playlist", 0.25);
        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["error"], "HTTP 404 when fetching playlist");
        assert_eq!(json["processing_time"], 0.25);
    }

    #[test]
    fn test_retryable_transport_errors() {
        let timeout = TransportError::Timeout {
            url: "http://example.com/a.ts".to_string(),
        };
        let exhausted = TransportError::RetriesExhausted {
            url: "http://example.com/a.ts".to_string(),
            status: 503,
            attempts: 3,
        };

        assert!(timeout.is_retryable());
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn test_monitor_error_converts_into_app_error() {
        let err: AppError = MonitorError::parse("http://example.com/live.m3u8", "missing #EXTM3U").into();
        assert!(err.to_string().contains("missing #EXTM3U"));
    }
}

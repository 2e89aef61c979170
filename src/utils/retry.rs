//! Retry utilities for HTTP requests
//!
//! Retries connection failures, timeouts and a configurable set of HTTP
//! statuses with exponential backoff, mirroring a transport-level retry
//! adapter. Callers see either the first acceptable response or a single
//! [`TransportError`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::errors::{TransportError, TransportResult};
use crate::utils::jitter::generate_jitter_percent;
use crate::utils::url::UrlUtils;

/// Configuration for request retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Add up to 25% jitter to each delay
    pub jitter: bool,
    /// Statuses treated as transient
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_http_config(&HttpConfig::default())
    }
}

impl RetryConfig {
    pub fn from_http_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.backoff_factor,
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
            retry_statuses: config.retry_statuses.clone(),
        }
    }

    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            retry_statuses: Vec::new(),
            ..Self::default()
        }
    }

    pub fn is_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Run an HTTP operation with retry logic
///
/// `operation` yields the response status alongside its payload. A status in
/// `retry_statuses` is retried like a transport error; when it persists
/// through every attempt the call fails with
/// [`TransportError::RetriesExhausted`].
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    url: &str,
    mut operation: F,
) -> TransportResult<(u16, T)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TransportResult<(u16, T)>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let failure = match operation().await {
            Ok((status, payload)) if !config.is_retry_status(status) => {
                if attempt > 1 {
                    debug!(
                        "Request to {} succeeded on attempt {}/{}",
                        UrlUtils::obfuscate_credentials(url),
                        attempt,
                        max_attempts
                    );
                }
                return Ok((status, payload));
            }
            Ok((status, _)) => TransportError::RetriesExhausted {
                url: url.to_string(),
                status,
                attempts: attempt,
            },
            Err(err) if err.is_retryable() => err,
            Err(err) => {
                debug!("Request failed with non-retryable error: {}", err);
                return Err(err);
            }
        };

        if attempt >= max_attempts {
            warn!(
                "Request to {} failed after {} attempts: {}",
                UrlUtils::obfuscate_credentials(url),
                attempt,
                failure
            );
            return Err(failure);
        }

        let delay = calculate_delay(config, attempt);
        debug!(
            "Request to {} failed on attempt {}/{}, retrying in {:?}: {}",
            UrlUtils::obfuscate_credentials(url),
            attempt,
            max_attempts,
            delay,
            failure
        );
        sleep(delay).await;
        attempt += 1;
    }
}

/// Exponential backoff: `initial * multiplier^(attempt-1)`, capped, plus optional jitter
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponential_delay = config.initial_delay.as_millis() as f64
        * config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

    let delay_ms = exponential_delay.min(config.max_delay.as_millis() as f64) as u64;

    let final_delay = if config.jitter {
        delay_ms + generate_jitter_percent(delay_ms, 25)
    } else {
        delay_ms
    };

    Duration::from_millis(final_delay)
}

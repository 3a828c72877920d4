//! Retry policy for model endpoint calls
//!
//! Exponential backoff with jitter for transient HTTP errors, honoring
//! `Retry-After` on rate-limited responses. Only transport-level failures
//! are ever retried: a structurally valid negative verdict is an answer,
//! not an error, and never reaches this module.
//!
//! Retryable status codes: 429, 500, 502, 503, 529.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for endpoint retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for exponential growth)
    pub max_delay_ms: u64,

    /// HTTP status codes that trigger a retry
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            retryable_status_codes: vec![429, 500, 502, 503, 529],
        }
    }
}

impl RetryConfig {
    /// Create a retry config with no retries
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Check if a given HTTP status code is retryable
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_status_codes.contains(&status.as_u16())
    }

    /// Delay for a given attempt number (0-indexed): `base * 2^attempt`
    /// capped at `max_delay_ms`, with deterministic jitter of up to ±25%.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
        let capped = exp_delay.min(self.max_delay_ms);

        let jitter_range = capped / 4;
        let jitter = if jitter_range > 0 {
            let jitter_offset = (attempt as u64 * 7 + 3) % (jitter_range * 2 + 1);
            capped - jitter_range + jitter_offset
        } else {
            capped
        };

        Duration::from_millis(jitter)
    }

    /// Parse a `Retry-After` header value (integer or decimal seconds).
    /// Values outside (0, 300] are ignored.
    pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
        let value = header_value?.trim();
        if let Ok(seconds) = value.parse::<f64>() {
            if seconds > 0.0 && seconds <= 300.0 {
                return Some(Duration::from_secs_f64(seconds));
            }
        }
        None
    }
}

/// Outcome of a single HTTP attempt, used by the retry loop
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// Request succeeded
    Success(T),
    /// Request failed with a retryable error
    Retryable {
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },
    /// Request failed with a non-retryable error (bail immediately)
    Fatal(Error),
}

/// Execute an async operation with retry.
///
/// The `operation` closure is called once per attempt and must return an
/// `AttemptOutcome`. Retryable failures wait with backoff (preferring the
/// server's `Retry-After` when present); fatal failures and exhausted
/// retries return an error.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn(u32) -> Fut,
    Fut: std::future::Future<Output = AttemptOutcome<T>>,
{
    let mut last_status = None;
    let mut last_body = String::new();

    for attempt in 0..=config.max_retries {
        match operation(attempt).await {
            AttemptOutcome::Success(value) => {
                if attempt > 0 {
                    tracing::info!("model endpoint request succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            AttemptOutcome::Fatal(err) => {
                return Err(err);
            }
            AttemptOutcome::Retryable {
                status,
                body,
                retry_after,
            } => {
                last_status = Some(status);
                last_body = body;

                if attempt < config.max_retries {
                    let delay = retry_after.unwrap_or_else(|| config.delay_for_attempt(attempt));

                    tracing::warn!(
                        "model endpoint request failed with {} (attempt {}/{}), retrying in {:?}",
                        status,
                        attempt + 1,
                        config.max_retries + 1,
                        delay,
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let status = last_status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Err(Error::Transport(format!(
        "request failed after {} attempts, last status {}: {}",
        config.max_retries + 1,
        status,
        last_body,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retryable_status_codes, vec![429, 500, 502, 503, 529]);
    }

    #[test]
    fn retryable_status_classification() {
        let config = RetryConfig::default();
        assert!(config.is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(config.is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(config.is_retryable_status(StatusCode::from_u16(529).unwrap()));

        assert!(!config.is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!config.is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!config.is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            ..Default::default()
        };

        let d0 = config.delay_for_attempt(0);
        assert!(d0.as_millis() >= 750 && d0.as_millis() <= 1250);

        let d1 = config.delay_for_attempt(1);
        assert!(d1.as_millis() >= 1500 && d1.as_millis() <= 2500);

        // Attempt 10 would be 1024s uncapped
        let d10 = config.delay_for_attempt(10);
        assert!(d10.as_millis() <= 6250);
    }

    #[test]
    fn parse_retry_after_values() {
        assert_eq!(
            RetryConfig::parse_retry_after(Some("5")),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            RetryConfig::parse_retry_after(Some("1.5")),
            Some(Duration::from_secs_f64(1.5))
        );
        assert_eq!(RetryConfig::parse_retry_after(None), None);
        assert_eq!(RetryConfig::parse_retry_after(Some("not-a-number")), None);
        assert_eq!(RetryConfig::parse_retry_after(Some("-1")), None);
        assert_eq!(RetryConfig::parse_retry_after(Some("301")), None);
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(&config, |_attempt| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                AttemptOutcome::Success("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(&config, |attempt| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    AttemptOutcome::Retryable {
                        status: StatusCode::TOO_MANY_REQUESTS,
                        body: "rate limited".to_string(),
                        retry_after: None,
                    }
                } else {
                    AttemptOutcome::Success("recovered")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_failure() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 10,
            max_delay_ms: 50,
            ..Default::default()
        };

        let result: Result<&str> = with_retry(&config, |_attempt| async {
            AttemptOutcome::Retryable {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "service down".to_string(),
                retry_after: None,
            }
        })
        .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("3 attempts"));
        assert!(err.contains("503"));
        assert!(err.contains("service down"));
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<&str> = with_retry(&config, |_attempt| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                AttemptOutcome::Fatal(Error::Transport("invalid API key".into()))
            }
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("invalid API key"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_after_header_is_honored() {
        let config = RetryConfig {
            max_retries: 1,
            base_delay_ms: 10,
            max_delay_ms: 50,
            ..Default::default()
        };

        let start = tokio::time::Instant::now();
        let result = with_retry(&config, |attempt| async move {
            if attempt == 0 {
                AttemptOutcome::Retryable {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    body: "rate limited".to_string(),
                    retry_after: Some(Duration::from_millis(100)),
                }
            } else {
                AttemptOutcome::Success("ok")
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}

//! Retry Logic for Model Service Calls
//!
//! Exponential backoff with jitter for transient transport failures.

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::MemoriaError;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Give up once this much time has passed since the first attempt
    pub max_elapsed: Duration,
    /// HTTP status codes worth retrying
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            max_elapsed: Duration::from_secs(20),
            retryable_status_codes: vec![
                429, // Too Many Requests
                500, // Internal Server Error
                502, // Bad Gateway
                503, // Service Unavailable
                504, // Gateway Timeout
            ],
        }
    }
}

impl RetryConfig {
    /// Create a config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_elapsed: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Builder: set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Builder: set the overall retry deadline
    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = elapsed;
        self
    }

    /// Check if a status code is retryable
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.backoff_multiplier.max(1.0))
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

/// Execute an async operation, retrying errors it marks as transient.
///
/// The operation classifies its own failures with
/// [`backoff::Error::transient`] and [`backoff::Error::permanent`].
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, MemoriaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, backoff::Error<MemoriaError>>>,
{
    backoff::future::retry_notify(config.backoff(), operation, |err: MemoriaError, delay| {
        warn!(error = %err, ?delay, "Model service call failed, retrying");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_initial_delay(Duration::from_millis(5))
            .with_max_elapsed(Duration::from_secs(2))
    }

    #[test]
    fn test_retryable_status() {
        let config = RetryConfig::default();
        assert!(config.is_retryable_status(429));
        assert!(config.is_retryable_status(503));
        assert!(!config.is_retryable_status(400));
        assert!(!config.is_retryable_status(404));
    }

    #[tokio::test]
    async fn test_with_retry_eventual_success() {
        let attempts = AtomicUsize::new(0);

        let result = with_retry(&fast(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(backoff::Error::transient(MemoriaError::Transport(
                        "connection refused".to_string(),
                    )))
                } else {
                    Ok("summary")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "summary");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), MemoriaError> = with_retry(&fast(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(backoff::Error::permanent(MemoriaError::Transport(
                    "404 not found".to_string(),
                )))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

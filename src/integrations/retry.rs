//! Bounded retry for tracker API calls
//!
//! Tracker clients wrap each request in [`with_retry`]. Only errors that
//! classify themselves as transient (server-side 5xx, timeouts) are retried;
//! everything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    /// Three attempts in total, five seconds apart
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryConfig {
    /// `attempts` total tries with a constant `delay` between them
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            delay,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation
    Retry,
    /// Don't retry, the error is permanent
    NoRetry,
}

/// Trait for errors that can indicate whether to retry
pub trait RetryableError {
    /// Determine if this error should be retried
    fn retry_decision(&self) -> RetryDecision;
}

/// Execute an async operation with retry logic
///
/// Returns the first success, the first permanent error, or the last
/// transient error once `config.max_retries` retries are used up.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => match e.retry_decision() {
                RetryDecision::NoRetry => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation failed with non-retryable error: {}",
                        e
                    );
                    return Err(e);
                }
                RetryDecision::Retry => {
                    if attempt >= config.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation failed after {} attempts: {}",
                            attempt + 1,
                            e
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = config.max_retries + 1,
                        delay_secs = config.delay.as_secs_f64(),
                        "Retrying after error: {}",
                        e
                    );

                    sleep(config.delay).await;
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_fixed_attempts() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_fixed_counts_total_attempts() {
        let config = RetryConfig::fixed(1, Duration::from_secs(2));
        assert_eq!(config.max_retries, 0);

        let none = RetryConfig::none();
        assert_eq!(none.max_retries, 0);
        assert_eq!(none.delay, Duration::ZERO);
    }

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError(retryable={})", self.retryable)
        }
    }

    impl RetryableError for TestError {
        fn retry_decision(&self) -> RetryDecision {
            if self.retryable {
                RetryDecision::Retry
            } else {
                RetryDecision::NoRetry
            }
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let config = RetryConfig::fixed(3, Duration::from_millis(1));
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(TestError { retryable: true })
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_three_attempts() {
        let config = RetryConfig::fixed(3, Duration::from_millis(1));
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            async move { Err(TestError { retryable: true }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let config = RetryConfig::fixed(3, Duration::from_millis(1));
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            async move { Err(TestError { retryable: false }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_none_makes_a_single_attempt() {
        let config = RetryConfig::none();
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            async move { Err(TestError { retryable: true }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}

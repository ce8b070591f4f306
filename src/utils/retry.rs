//! Retry utilities with exponential backoff for resilient API calls.
//!
//! Every outbound call in the pipeline goes through [`with_retry`]. What is
//! retried is decided by the error type (via [`Transient`]) together with
//! the [`RetryConfig`] the call site passes in.

use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (1.0 gives a fixed delay)
    pub backoff_multiplier: f64,
    /// Also retry network failures and 5xx responses, not only rate limits
    pub retry_server_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            retry_server_errors: false,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff doubling from `initial_delay`
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Constant delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            ..Default::default()
        }
    }

    /// Set maximum attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Retry network and server errors as well
    pub fn retry_server_errors(mut self, enabled: bool) -> Self {
        self.retry_server_errors = enabled;
        self
    }

    /// Backoff delay after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Whether this configuration retries the given kind of failure
    pub fn should_retry(&self, transient: &TransientError) -> bool {
        match transient {
            TransientError::RateLimit(_) | TransientError::InvalidResponse => true,
            TransientError::Network
            | TransientError::ServerError
            | TransientError::ServiceUnavailable
            | TransientError::Timeout => self.retry_server_errors,
        }
    }
}

/// Transient errors that may trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// HTTP 429 (with optional Retry-After seconds)
    RateLimit(Option<u64>),
    /// Network connectivity issues
    Network,
    /// Server error (5xx)
    ServerError,
    /// Service unavailable (503)
    ServiceUnavailable,
    /// Request timeout
    Timeout,
    /// Response did not satisfy the expected output contract
    InvalidResponse,
}

impl TransientError {
    /// Classify a reqwest error
    pub fn from_reqwest_error(err: &reqwest::Error) -> Option<Self> {
        if err.is_timeout() {
            return Some(TransientError::Timeout);
        }
        if err.is_connect() {
            return Some(TransientError::Network);
        }
        err.status().and_then(Self::from_status)
    }

    /// Classify an HTTP status code
    pub fn from_status(status: reqwest::StatusCode) -> Option<Self> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Some(TransientError::RateLimit(None))
        } else if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            Some(TransientError::ServiceUnavailable)
        } else if status.is_server_error() {
            Some(TransientError::ServerError)
        } else {
            None
        }
    }

    /// Minimum delay requested by the server, if any
    pub fn server_delay(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Errors that can describe themselves as transient
pub trait Transient {
    fn transient(&self) -> Option<TransientError>;
}

/// Execute an async operation with retry logic
///
/// Retries while the error is transient, the configuration accepts that kind
/// of failure, and attempts remain. The delay grows by `backoff_multiplier`
/// per attempt; a server-provided Retry-After wins when it is longer (still
/// capped at `max_delay`).
pub async fn with_retry<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                let Some(transient) = error.transient() else {
                    return Err(error);
                };

                if !config.should_retry(&transient) {
                    return Err(error);
                }

                if attempt >= max_attempts {
                    tracing::warn!("Operation failed after {} attempts: {}", attempt, error);
                    return Err(error);
                }

                let mut delay = config.delay_for(attempt);
                if let Some(requested) = transient.server_delay() {
                    delay = delay.max(requested.min(config.max_delay));
                }

                tracing::debug!(
                    "Transient error on attempt {}/{}: {:?}, retrying in {:?}",
                    attempt,
                    max_attempts,
                    transient,
                    delay
                );

                sleep(delay).await;
            }
        }
    }
}

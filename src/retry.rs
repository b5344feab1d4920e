//! Retry logic with exponential backoff
//!
//! Network-bound operations (source requests, image downloads) are retried
//! on transient failures with exponential backoff and optional jitter.
//! Permanent failures (bad configuration, authentication, malformed payloads)
//! are never retried.

use crate::config::RetryConfig;
use crate::error::{AssetError, SourceFetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection resets, 5xx and 429
/// responses) should return `true`. Permanent failures (authentication,
/// malformed payloads, unsupported content) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for SourceFetchError {
    fn is_retryable(&self) -> bool {
        match self {
            SourceFetchError::Network { cause, .. } => {
                cause.is_timeout() || cause.is_connect() || cause.is_request()
            }
            // 5xx is a server hiccup, 429 is rate limiting; other statuses
            // (404, 401, ...) will not improve on retry
            SourceFetchError::Status { status, .. } => *status >= 500 || *status == 429,
            SourceFetchError::Malformed { .. } => false,
            SourceFetchError::Auth { .. } => false,
            SourceFetchError::Cancelled { .. } => false,
        }
    }
}

impl IsRetryable for AssetError {
    fn is_retryable(&self) -> bool {
        match self {
            AssetError::Download { cause, .. } => {
                cause.is_timeout() || cause.is_connect() || cause.is_request()
            }
            AssetError::Status { status, .. } => *status >= 500 || *status == 429,
            AssetError::UnsupportedType { .. } => false,
            AssetError::TooLarge { .. } => false,
            AssetError::Store { .. } => false,
            AssetError::AllImagesFailed { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result, or the last error once the attempt budget
/// is exhausted or a non-retryable error is hit.
pub async fn fetch_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter { add_jitter(delay) } else { delay };

                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay falls between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}

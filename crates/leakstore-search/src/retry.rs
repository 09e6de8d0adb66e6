//! Retry Logic with Exponential Backoff
//!
//! Transient backend failures (connection refused during a rolling restart,
//! a 503 from an overloaded node) are retried with exponential backoff:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  RetryPolicy                 │
//! │  - max_retries: 5            │
//! │  - initial_backoff: 100ms    │
//! │  - max_backoff: 30s          │
//! │  - backoff_multiplier: 2.0   │
//! └──────┬───────────────────────┘
//!        │
//!        ├─→ Attempt 1: immediate
//!        ├─→ Attempt 2: wait 100ms
//!        ├─→ Attempt 3: wait 200ms
//!        ├─→ Attempt 4: wait 400ms
//!        └─→ ...capped at max_backoff
//! ```
//!
//! Permanent failures ([`SearchError::is_retryable`] returns false) are
//! returned immediately. The jittered variant spreads simultaneous retries
//! out (±25%) so many workers hammering one recovering backend do not
//! resynchronize.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::SearchError;

/// Retry policy configuration for exponential backoff.
///
/// Backoff for attempt `n` (0-indexed) is
/// `min(initial_backoff * multiplier^n, max_backoff)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: usize,

    /// Initial backoff duration.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential growth.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Backoff duration for a given attempt number (0-indexed).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }
}

/// Retry an operation with exponential backoff.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once retries are exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis(),
                    error = %error,
                    "retryable error, backing off"
                );
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Retry an operation with jittered exponential backoff.
///
/// Each wait is scaled by a random factor in 0.75-1.25x so simultaneous
/// retries from many workers spread out instead of arriving as a wave.
pub async fn retry_with_jittered_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                if attempt >= policy.max_retries {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        error = %error,
                        "max retries exhausted, giving up"
                    );
                    return Err(error);
                }

                let base = policy.backoff(attempt);
                let jitter = 0.75 + (rand::random::<f64>() * 0.5);
                let backoff = Duration::from_millis((base.as_millis() as f64 * jitter) as u64);
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis(),
                    error = %error,
                    "retryable error, backing off with jitter"
                );
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

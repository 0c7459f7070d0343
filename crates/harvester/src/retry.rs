//! Retry logic with exponential backoff for fetch operations.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FetchError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first failure (default: 3).
    pub max_retries: u32,
    /// Initial backoff in milliseconds (default: 100).
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds (default: 10 seconds).
    pub max_backoff_ms: u64,
    /// Multiplier for exponential backoff (default: 2.0).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to backoff (default: true).
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// Operation succeeded.
    Success(T),
    /// Retries exhausted, or a permanent error was hit.
    Exhausted {
        /// The last error that occurred.
        last_error: FetchError,
        /// Total number of attempts made.
        attempts: u32,
    },
}

/// Executor for retried fetches.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new RetryExecutor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Executor that never retries.
    pub fn no_retry() -> Self {
        Self::new(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    /// Run `operation`, retrying retryable errors with exponential backoff.
    ///
    /// Permanent errors fail immediately. `on_retry` is called once per
    /// scheduled retry, before the backoff sleep.
    pub async fn execute<F, Fut, T, R>(&self, operation: F, mut on_retry: R) -> RetryOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        R: FnMut(&FetchError, Duration),
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) => {
                    if !e.is_retryable() || attempt > self.config.max_retries {
                        return RetryOutcome::Exhausted {
                            last_error: e,
                            attempts: attempt,
                        };
                    }
                    let backoff = self.compute_backoff(attempt - 1);
                    warn!(attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "Fetch failed, retrying");
                    on_retry(&e, backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Backoff before retry number `attempt` (0-based).
    ///
    /// `initial_backoff * multiplier^attempt`, capped at `max_backoff`, plus up
    /// to 50% jitter when enabled.
    fn compute_backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.config.initial_backoff_ms as f64;
        let computed = base_ms * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = computed.min(self.config.max_backoff_ms as f64) as u64;

        if self.config.jitter && capped > 1 {
            let jitter_ms = rand::thread_rng().gen_range(0..=capped / 2);
            Duration::from_millis(capped.saturating_add(jitter_ms))
        } else {
            Duration::from_millis(capped)
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

//! Retry logic with exponential backoff for store operations.
//!
//! Only transient transport failures are retried; validation and access
//! errors fail on the first attempt. Each attempt carries its own timeout at
//! the call site — backoff sleep never counts against it.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{ClientError, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3).
    pub max_retries: u32,
    /// Initial backoff duration (default: 100ms).
    pub initial_backoff: Duration,
    /// Maximum backoff duration (default: 10 seconds).
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff (default: 2.0).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to backoff (default: true).
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
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
    /// The operation failed permanently or exhausted its attempts.
    Exhausted {
        /// The last error that occurred.
        last_error: ClientError,
        /// Total number of attempts made.
        attempts: u32,
    },
}

/// Executor for retried operations.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new RetryExecutor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation, retrying transient failures with exponential
    /// backoff. Permanent errors fail on the first attempt.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> RetryOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) => {
                    let maxed_out = attempt > self.config.max_retries;
                    if !e.is_retryable() || maxed_out {
                        return RetryOutcome::Exhausted {
                            last_error: e,
                            attempts: attempt,
                        };
                    }
                    let backoff = self.compute_backoff(attempt - 1);
                    tracing::debug!(
                        "transient failure (attempt {}), retrying in {:?}: {}",
                        attempt,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Compute the exponential backoff duration for a given attempt,
    /// capped at `max_backoff`, with optional jitter of up to 50%.
    fn compute_backoff(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.config.initial_backoff.as_millis() as f64;
        let multiplier = self.config.backoff_multiplier;
        let max_delay_ms = self.config.max_backoff.as_millis() as f64;

        let computed = base_delay_ms * multiplier.powi(attempt as i32);
        let capped = computed.min(max_delay_ms);

        if self.config.jitter {
            let jitter_ms = simple_jitter(capped as u64 / 2);
            Duration::from_millis((capped as u64).saturating_add(jitter_ms))
        } else {
            Duration::from_millis(capped as u64)
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Generate simple jitter using system time entropy.
fn simple_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let nanos = Instant::now().elapsed().subsec_nanos() as u64;
    let ts_nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    (nanos ^ ts_nanos) % max_ms
}

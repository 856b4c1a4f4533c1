use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::{Error as BackoffError, ExponentialBackoff};
use tracing::warn;

use crate::error::SwapError;

/// Retry policy configuration
///
/// Applied only at the quote and broadcast boundaries; every other stage
/// surfaces its error on the first failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn to_exponential_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: self.multiplier,
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    /// Retry an async operation with exponential backoff, honoring the
    /// error classification: only `SwapError::retryable()` failures are
    /// retried, everything else is returned immediately.
    pub async fn retry_classified<F, Fut, T>(&self, mut operation: F) -> Result<T, SwapError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, SwapError>>,
    {
        let backoff = self.to_exponential_backoff();
        // Atomic rather than Cell so the returned future stays Send and
        // callers can tokio::spawn it
        let attempts = AtomicU32::new(0);
        let max_retries = self.max_retries;

        backoff::future::retry(backoff, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let fut = operation();
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.retryable() && attempt <= max_retries => {
                        warn!(attempt, "operation failed, will retry: {}", e);
                        Err(BackoffError::transient(e))
                    }
                    Err(e) => Err(BackoffError::permanent(e)),
                }
            }
        })
        .await
    }
}

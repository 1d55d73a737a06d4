//! Bounded, cancellable retry for ledger round trips
//!
//! Delays grow linearly: the wait before attempt `k + 1` is `k * base_delay`.
//! Only transient errors (see [`Error::is_transient`]) are retried; anything
//! else is returned immediately.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::backoff::Backoff;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Treated as at least 1.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay inserted after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    fn schedule(&self) -> LinearBackoff {
        LinearBackoff {
            policy: *self,
            failures: 0,
        }
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// attempt budget, or `cancel` fires.
    ///
    /// Exhaustion yields [`Error::RetriesExhausted`] wrapping the last error.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = AtomicU32::new(0);

        let attempt = || {
            let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let future = operation();
            async move {
                future.await.map_err(|e| {
                    if e.is_transient() {
                        tracing::debug!(operation = label, attempt = current, error = %e, "transient failure");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        };

        let notify = |e: Error, delay: Duration| {
            tracing::warn!(operation = label, error = %e, ?delay, "retrying");
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = backoff::future::retry_notify(self.schedule(), attempt, notify) => outcome,
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => Err(Error::RetriesExhausted {
                operation: label.to_string(),
                attempts: attempts.load(Ordering::SeqCst),
                source: Box::new(e),
            }),
            Err(e) => Err(e),
        }
    }
}

/// `backoff` schedule yielding `k * base_delay` after the k-th failure.
#[derive(Debug, Clone)]
struct LinearBackoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.failures = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.failures + 1 >= self.policy.attempts.max(1) {
            return None;
        }
        self.failures += 1;
        Some(self.policy.delay_after(self.failures))
    }
}

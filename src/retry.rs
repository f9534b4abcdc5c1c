//! Retry/backoff policy shared by every call to a flaky upstream.
//!
//! Each network-facing component used to need its own retry loop; instead a
//! single policy object is applied uniformly through a decorator:
//!
//! - [`Attempt`]: a unit of work that can be attempted against an upstream
//! - [`Transient`]: classifies an error as retryable or not
//! - [`Retry`]: decorator that drives the backoff loop around any [`Attempt`]
//!
//! # Retry Strategy
//!
//! - Up to 5 attempts by default
//! - Exponential backoff starting at 1 second: 1s, 2s, 4s, 8s, 16s
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - A permanent error stops the loop after exactly one attempt
//! - No sleep after the final failure or after success

use rand::{Rng, rng};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Classification of a failure as retryable or not.
///
/// Transport failures, timeouts, and rate-limit/server status codes are
/// expected to resolve themselves on retry; anything else (bad request,
/// auth failure) will fail the same way every time and must not be retried.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// A unit of work that can be attempted against an unreliable upstream.
///
/// Implementors bundle everything one attempt needs (client, prompt,
/// payload) so the retry decorator can re-run it verbatim.
pub trait Attempt {
    /// The value produced by a successful attempt.
    type Output;
    /// The error a failed attempt reports, carrying its own classification.
    type Error: Transient + fmt::Display;

    async fn attempt(&self) -> Result<Self::Output, Self::Error>;
}

/// Backoff parameters applied by [`Retry`].
///
/// The delay after the `n`-th failed attempt follows:
///
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt ceiling, first attempt included.
    pub max_attempts: usize,
    /// Initial delay between attempts (doubles with each failure).
    pub base_delay: Duration,
    /// Cap on the deterministic part of the delay.
    pub max_delay: Duration,
    /// Upper bound on the random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay slept after the given failed attempt
    /// (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(31));
        delay.min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let cap = self.max_jitter.as_millis() as u64;
        if cap == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng().random_range(0..=cap))
    }
}

/// Decorator that adds the backoff loop to any [`Attempt`] implementation.
pub struct Retry<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> Retry<T>
where
    T: Attempt,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Run the attempt until success, a permanent failure, or exhaustion.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<T::Output, T::Error> {
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.inner.attempt().await {
                Ok(out) => return Ok(out),
                Err(e) => {
                    if !e.is_transient() {
                        error!(attempt, error = %e, "permanent failure; not retrying");
                        return Err(e);
                    }
                    if attempt >= self.policy.max_attempts {
                        error!(
                            attempt,
                            max = self.policy.max_attempts,
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_for(attempt) + self.policy.jitter();
                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        ?delay,
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for Retry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry").field("policy", &self.policy).finish()
    }
}

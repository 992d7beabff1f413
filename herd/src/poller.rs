use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::BarrierConfig;

/// Why a poll ended without the predicate being satisfied.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("deadline of {timeout:?} exceeded after {attempts} attempts")]
    DeadlineExceeded { timeout: Duration, attempts: u32 },
    /// The predicate itself failed; polling stops immediately.
    #[error(transparent)]
    Predicate(#[from] anyhow::Error),
}

/// Evaluates a readiness predicate at a fixed interval until it holds or a
/// deadline passes.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessPoller {
    interval: Duration,
    timeout: Duration,
}

impl ReadinessPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `predicate` until it yields `true`.
    ///
    /// Returns as soon as the predicate first holds. When it never does, the
    /// call fails no later than `timeout + interval` after it started (plus
    /// the predicate's own evaluation time). Errors from the predicate are
    /// propagated without retrying; predicates that should tolerate transient
    /// failure must map them to `Ok(false)`.
    pub async fn poll<F, Fut>(&self, mut predicate: F) -> Result<u32, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<bool>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            if predicate().await? {
                tracing::debug!(attempts, elapsed = ?started.elapsed(), "readiness predicate satisfied");
                return Ok(attempts);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(PollError::DeadlineExceeded {
                    timeout: self.timeout,
                    attempts,
                });
            }

            tracing::trace!(attempts, ?elapsed, "readiness predicate not yet satisfied");
            tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }
}

impl From<BarrierConfig> for ReadinessPoller {
    fn from(config: BarrierConfig) -> Self {
        Self::new(config.interval(), config.timeout())
    }
}

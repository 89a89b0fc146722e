//! Bounded retry with linear backoff.
//!
//! A policy of `retries = 2, delay = 250ms` makes at most three attempts and
//! sleeps 250ms after the first failure and 500ms after the second. The
//! error from the final attempt is returned exactly as the operation produced
//! it, so callers can still tell a checksum failure from a network failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, UpdaterConfig};

/// How many times to re-run a failing operation and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Base delay; attempt `n` (0-based) waits `delay * (n + 1)` after failing.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl From<&UpdaterConfig> for RetryPolicy {
    fn from(cfg: &UpdaterConfig) -> Self {
        Self::new(cfg.retries, cfg.retry_delay)
    }
}

impl RetryPolicy {
    /// Create a policy.
    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Total attempts this policy allows.
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Backoff after the failed attempt with index `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt.saturating_add(1))
    }

    /// Run `op`, retrying every failure.
    ///
    /// `op` receives the 0-based attempt index.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(op, |_| true).await
    }

    /// Run `op`, retrying only failures accepted by `should_retry`.
    ///
    /// A rejected error is returned immediately without sleeping.
    pub async fn run_if<T, E, F, Fut, P>(&self, op: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        self.run_until(op, should_retry, &CancellationToken::new()).await
    }

    /// Like [`run_if`](Self::run_if), but gives up as soon as `cancel` fires.
    ///
    /// A cancellation during the backoff returns the error of the attempt
    /// that just failed; no further attempt is started.
    pub async fn run_until<T, E, F, Fut, P>(
        &self,
        mut op: F,
        should_retry: P,
        cancel: &CancellationToken,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.retries || !should_retry(&err) {
                        return Err(err);
                    }
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts(),
                        wait_ms = wait.as_millis() as u64,
                        "attempt failed, retrying: {err}"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(err),
                        () = tokio::time::sleep(wait) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Run `op` under a default-shaped policy with the given settings.
pub async fn with_retries<T, E, F, Fut>(op: F, retries: u32, delay: Duration) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy::new(retries, delay).run(op).await
}

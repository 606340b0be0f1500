//! Exponential backoff sleeper with jitter

use crate::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Doubling backoff capped at `max`, with up to 1/2 random jitter per step.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Next interval to wait, advancing the backoff
    pub fn next_interval(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);

        let jitter_ms = (base.as_millis() / 2) as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };

        (base + jitter).min(self.max)
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Sleep for the next interval, or fail with `Cancelled` if `token` fires first
    pub async fn sleep(&mut self, token: &CancellationToken) -> Result<()> {
        let interval = self.next_interval();
        tokio::select! {
            _ = token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }
}

/// Run `attempt` until it reports done, sleeping with `backoff` in between.
///
/// `attempt` returns `Ok(Some(v))` to stop with a value, `Ok(None)` to retry,
/// and `Err` to stop with an error.
pub async fn retry<T, F, Fut>(
    token: &CancellationToken,
    backoff: &mut Backoff,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>>>,
{
    loop {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(value) = attempt().await? {
            return Ok(value);
        }
        backoff.sleep(token).await?;
    }
}

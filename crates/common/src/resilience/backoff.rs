//! Retry delays and cancellable waits.
//!
//! The delay before retry `n` (zero based) is `base * 2^n` plus a random
//! jitter in `[0, max_jitter)`.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::config::ResilienceConfig;
use crate::storage::{StorageError, StorageResult};

/// Granularity at which blocking waits poll the cancellation token.
const BLOCKING_POLL_SLICE: Duration = Duration::from_millis(10);

/// Exponential backoff with additive jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max_jitter: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max_jitter: Duration) -> Self {
        Self { base, max_jitter }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(config.base_backoff(), config.max_jitter())
    }

    /// Delay without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay including a fresh jitter sample.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}

/// Suspend for `delay`, returning early with [`StorageError::Cancelled`] if
/// the token fires first.
pub async fn wait(delay: Duration, cancel: Option<&CancellationToken>) -> StorageResult<()> {
    match cancel {
        Some(token) => tokio::select! {
            () = token.cancelled() => Err(StorageError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

/// Block the current thread for `delay`, checking the token between short
/// slices.
pub fn wait_blocking(delay: Duration, cancel: Option<&CancellationToken>) -> StorageResult<()> {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(StorageError::Cancelled);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        std::thread::sleep(remaining.min(BLOCKING_POLL_SLICE));
    }
}

use crate::error::{ReceiptSearchError, Result};
use rand::thread_rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Longest backoff a policy may configure: one hour.
pub const MAX_RETRY_DELAY_MS: u64 = 3_600_000;

/// Exponential backoff parameters.
///
/// The delay before retry `n` (1-based) is `initial_delay_ms * backoff_factor^(n-1)`,
/// capped at `max_delay_ms`, then scaled by a random factor in `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of calls, the first one included.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ReceiptSearchError::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ReceiptSearchError::InvalidConfig(format!(
                "retry max_delay_ms {} exceeds {}",
                self.max_delay_ms, MAX_RETRY_DELAY_MS
            )));
        }
        if self.backoff_factor < 1.0 {
            return Err(ReceiptSearchError::InvalidConfig(format!(
                "retry backoff_factor {} must be >= 1.0",
                self.backoff_factor
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(ReceiptSearchError::InvalidConfig(format!(
                "retry jitter {} must be in [0.0, 1.0)",
                self.jitter
            )));
        }
        Ok(())
    }

    /// Backoff before retry `retry` (1-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let raw = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        Duration::from_millis(raw.min(self.max_delay_ms as f64) as u64)
    }

    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 {
            return base;
        }
        let spread = Uniform::new_inclusive(1.0 - self.jitter, 1.0 + self.jitter);
        let scaled = (base.as_secs_f64() * spread.sample(&mut thread_rng())).max(0.0);
        Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX)
    }
}

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or the
/// policy's attempts are spent. `on_retry(attempt, delay, &error)` fires before each
/// backoff sleep, `attempt` being the number of the call that just failed.
pub async fn retry_with_backoff<T, E, F, Fut, P, O>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut on_retry: O,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    O: FnMut(u32, Duration, &E),
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.jittered_delay(attempt);
                on_retry(attempt, delay, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

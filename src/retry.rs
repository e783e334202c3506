use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Exponential backoff for asset fetches. Jitter keeps concurrent work items
/// that failed together from retrying in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-indexed):
    /// `min(base * 2^retry, max) + jitter(0..base)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms > 0 {
            rand::thread_rng().gen_range(0..base_ms)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }
}

/// Run `operation` until it succeeds, `is_retryable` rejects the error, or
/// the policy's retries are used up. Returns the last error in the latter two
/// cases.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let total_attempts = policy.max_retries + 1;
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };
        attempt += 1;
        if attempt >= total_attempts || !is_retryable(&err) {
            return Err(err);
        }
        let delay = policy.delay_for_retry(attempt - 1);
        tracing::warn!(
            "Retryable error (attempt {}/{}), retrying in {}ms: {}",
            attempt,
            total_attempts,
            delay.as_millis(),
            err
        );
        tokio::time::sleep(delay).await;
    }
}

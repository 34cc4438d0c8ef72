//! Retry with exponential backoff for transient collaborator failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AdapterError, AdapterResult};

/// Retry settings shared by the store and notifier adapters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or runs out
/// of retries.
///
/// When retries run out the last error is wrapped in
/// [`AdapterError::RetriesExhausted`]; a non-transient error is returned as is.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    what: &str,
    mut op: F,
) -> AdapterResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AdapterResult<T>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(AdapterError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = config.delay_for(attempt);
                warn!(
                    event = "adapter.retry",
                    what = %what,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

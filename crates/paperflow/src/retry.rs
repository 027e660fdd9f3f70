//! Exponential backoff for flaky connections.
//!
//! Only the mailbox connection is retried; every other network failure is reported as "no
//! result" for the record at hand.

use std::future::Future;

use super::*;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first one. Zero is treated as one.
  pub max_attempts: u32,
  /// Delay after the first failure.
  pub base_delay:   Duration,
  /// Upper bound on any single delay.
  pub max_delay:    Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 5, base_delay: Duration::from_secs(1), max_delay: Duration::from_secs(10) }
  }
}

impl RetryPolicy {
  /// Creates the default policy with a different attempt count.
  pub fn new(max_attempts: u32) -> Self { Self { max_attempts, ..Self::default() } }

  /// Sets the base delay.
  pub fn with_base_delay(mut self, delay: Duration) -> Self {
    self.base_delay = delay;
    self
  }

  /// Sets the delay cap.
  pub fn with_max_delay(mut self, delay: Duration) -> Self {
    self.max_delay = delay;
    self
  }

  /// Delay after the failed attempt numbered `attempt` (zero based): `min(base * 2^attempt, max)`.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(2u32.saturating_pow(attempt)).min(self.max_delay)
  }

  /// Runs `op` until it succeeds or the attempts are exhausted, returning the last error.
  ///
  /// `op` receives the zero based attempt number.
  pub async fn retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display, {
    let attempts = self.max_attempts.max(1);
    let mut attempt = 0;
    loop {
      match op(attempt).await {
        Ok(value) => return Ok(value),
        Err(e) if attempt + 1 >= attempts => {
          error!(attempt = attempt + 1, attempts, error = %e, "giving up");
          return Err(e);
        },
        Err(e) => {
          let delay = self.delay_for(attempt);
          warn!(attempt = attempt + 1, attempts, error = %e, ?delay, "attempt failed, retrying");
          tokio::time::sleep(delay).await;
          attempt += 1;
        },
      }
    }
  }
}

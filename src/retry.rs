//! Bounded retry for upstream provider calls

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;

/// Per-attempt timeout plus at most one retry on transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    /// Pause before a retry, jittered by +/-10%
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            attempt_timeout: Duration::from_millis(3000),
            backoff: Duration::from_millis(100),
        }
    }
}

impl From<&UpstreamConfig> for RetryPolicy {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Worst-case wall time of one `run`
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.attempt_timeout * (1 + self.max_retries) + self.backoff * 11 / 10 * self.max_retries
    }

    /// Run `call` under the policy. `call` is invoked again with the same
    /// parameters when the previous attempt failed transiently.
    pub async fn run<T, F, Fut>(&self, provider: &'static str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(UpstreamError::Timeout {
                    provider,
                    timeout_ms: u64::try_from(self.attempt_timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{provider} succeeded on retry {attempt}");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("{error}, retrying ({attempt}/{})", self.max_retries);
                    if !self.backoff.is_zero() {
                        let jitter: f32 = rand::rng().random_range(0.9..1.1);
                        tokio::time::sleep(self.backoff.mul_f32(jitter)).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}

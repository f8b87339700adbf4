use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::GenerationError;

/// Exponential backoff for internal-fault responses.
///
/// With the defaults a call is attempted three times, waiting 1s before the
/// second attempt and 2s before the third.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, for `attempt` starting at 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_delay
            .saturating_mul(self.backoff_factor.saturating_pow(exponent))
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. The backoff sleep is not cancellable.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt >= max_attempts {
                        return Err(GenerationError::RetryExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{label}: attempt {attempt}/{max_attempts} hit a server fault ({err}); retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

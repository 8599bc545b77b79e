use std::{future::Future, time::Duration};

use super::RoutingError;

/// Exponential backoff between attempts of a single routing call.
///
/// Every failure is retried; the error of the final attempt is returned as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(retry as i32 - 1);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, RoutingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RoutingError>>,
    {
        let mut retry = 0;
        loop {
            match attempt().await {
                Ok(value) => {
                    if retry > 0 {
                        tracing::debug!("{operation} succeeded after {retry} retries");
                    }
                    return Ok(value);
                }
                Err(err) if retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for_retry(retry);
                    tracing::warn!(
                        "{operation} failed ({err}), retry {retry}/{} in {:?}",
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(
                        "{operation} failed after {} attempts: {err}",
                        self.max_attempts()
                    );
                    return Err(err);
                }
            }
        }
    }
}

use super::breaker::CircuitBreaker;
use crate::error::CircuitOpenError;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    10000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Retries calls made through a circuit breaker with exponential backoff.
///
/// Every attempt goes through [`CircuitBreaker::execute`], so each one is
/// counted and gated by the breaker. Once the breaker opens, retrying stops
/// and the last error is returned.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute `f` through `breaker`, retrying errors accepted by `should_retry`
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        breaker: &CircuitBreaker,
        mut f: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + From<CircuitOpenError> + 'static,
        P: Fn(&E) -> bool,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                breaker = %breaker.name(),
                attempt,
                max_retries = self.config.max_retries,
                "Executing guarded call"
            );

            let err = match breaker.execute(&mut f).await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(breaker = %breaker.name(), attempt, "Call succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !should_retry(&err) {
                debug!(breaker = %breaker.name(), attempt, error = %err, "Error not retryable");
                return Err(err);
            }

            if !breaker.is_available().await {
                warn!(
                    breaker = %breaker.name(),
                    attempt,
                    error = %err,
                    "Circuit open, giving up on retries"
                );
                return Err(err);
            }

            if attempt > self.config.max_retries {
                warn!(
                    breaker = %breaker.name(),
                    attempt,
                    max_retries = self.config.max_retries,
                    error = %err,
                    "Call failed after max retries"
                );
                return Err(err);
            }

            match backoff.next_backoff() {
                Some(wait) => {
                    debug!(
                        breaker = %breaker.name(),
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Call failed, retrying after backoff"
                    );
                    tokio::time::sleep(wait).await;
                }
                None => {
                    warn!(breaker = %breaker.name(), attempt, error = %err, "Backoff exhausted");
                    return Err(err);
                }
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_backoff())
            .with_max_interval(self.config.max_backoff())
            .with_multiplier(self.config.backoff_multiplier)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None) // max retries are counted here
            .build()
    }
}

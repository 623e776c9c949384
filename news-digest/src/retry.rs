//! Retry policy shared by the fetch scheduler and the summarization caller.

use crate::config::{seconds, ScrapingConfig, SummarizationConfig};
use crate::types::{FetchError, SummarizationError};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff, SystemClock};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff with a predicate deciding which errors are
/// worth another attempt.
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            backoff_multiplier: self.backoff_multiplier,
            max_delay: self.max_delay,
            retryable: self.retryable,
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl<E: Display> RetryPolicy<E> {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        backoff_multiplier: f64,
        retryable: fn(&E) -> bool,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_multiplier,
            max_delay: base_delay.saturating_mul(32),
            retryable,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    fn backoff(&self) -> ExponentialBackoff<SystemClock> {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: self.backoff_multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Sleeps taken between attempts if every attempt fails.
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.max_attempts)
            .filter_map(|_| backoff.next_backoff())
            .collect()
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is reached.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Attempted<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    if !(self.retryable)(&e) || attempt >= self.max_attempts {
                        return Attempted {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                    let Some(delay) = backoff.next_backoff() else {
                        return Attempted {
                            result: Err(e),
                            attempts: attempt,
                        };
                    };
                    warn!(
                        "Attempt {}/{} failed for {}: {}, retrying in {:?}",
                        attempt, self.max_attempts, label, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl RetryPolicy<FetchError> {
    pub fn for_fetch(config: &ScrapingConfig) -> Self {
        RetryPolicy::new(
            config.max_attempts,
            seconds(config.base_delay),
            config.backoff_multiplier,
            FetchError::is_transient,
        )
        .with_max_delay(seconds(config.max_delay))
    }
}

impl RetryPolicy<SummarizationError> {
    pub fn for_summarization(config: &SummarizationConfig) -> Self {
        RetryPolicy::new(
            config.max_attempts,
            seconds(config.base_delay),
            2.0,
            SummarizationError::is_retryable,
        )
        .with_max_delay(seconds(config.max_delay))
    }
}

//! # Backoff and Retry
//!
//! Fibonacci backoff for reconcile requeues, and a bounded [`RetryPolicy`] for the
//! local retries inside a reconcile pass (status writes, scaling, bootstrap).
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can record delays instead of
//! waiting for them.
//!
//! ## Usage
//!
//! ```rust
//! use nodepool_ingress_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(5, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! assert_eq!(backoff.next_backoff_seconds(), 15);
//! ```

use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting at `min_seconds` and capped
/// at `max_seconds`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_seconds: u64,
    prev_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds,
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;
        let next = self.prev_seconds + self.current_seconds;
        self.prev_seconds = self.current_seconds;
        self.current_seconds = std::cmp::min(next, self.max_seconds);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_seconds = 0;
        self.current_seconds = self.min_seconds;
    }
}

/// Delay between attempts of a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    Fixed(Duration),
    Fibonacci { min_seconds: u64, max_seconds: u64 },
}

/// Bounded retry of a fallible async operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
        }
    }

    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Delays slept between consecutive attempts
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        let gaps = self.max_attempts.saturating_sub(1) as usize;
        match self.backoff {
            Backoff::None => vec![Duration::ZERO; gaps],
            Backoff::Fixed(delay) => vec![delay; gaps],
            Backoff::Fibonacci {
                min_seconds,
                max_seconds,
            } => {
                let mut fib = FibonacciBackoff::new(min_seconds, max_seconds);
                (0..gaps).map(|_| fib.next_backoff()).collect()
            }
        }
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or the
    /// attempts run out. `op` receives the 1-based attempt number. The last error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delays = self.delays().into_iter();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(delay) = delays.next() else {
                        return Err(err);
                    };
                    if !retryable(&err) {
                        return Err(err);
                    }
                    if !delay.is_zero() {
                        sleeper.sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Source of delays for retry loops
#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(5, 300);

        let seq: Vec<u64> = (0..10).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![5, 5, 10, 15, 25, 40, 65, 105, 170, 275]);
        assert_eq!(backoff.next_backoff_seconds(), 300);
        assert_eq!(backoff.next_backoff_seconds(), 300);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_policy_delays() {
        assert_eq!(RetryPolicy::immediate(5).delays(), vec![Duration::ZERO; 4]);
        assert_eq!(
            RetryPolicy::fixed(3, Duration::from_secs(2)).delays(),
            vec![Duration::from_secs(2); 2]
        );
        let fib = RetryPolicy {
            max_attempts: 4,
            backoff: Backoff::Fibonacci {
                min_seconds: 1,
                max_seconds: 2,
            },
        };
        assert_eq!(
            fib.delays(),
            vec![Duration::from_secs(1), Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(RetryPolicy::immediate(0).delays().is_empty());
    }

    #[tokio::test]
    async fn test_run_retries_until_success() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = RetryPolicy::fixed(5, Duration::from_secs(2))
            .run(&sleeper, |_| true, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(2); 2]);
    }

    #[tokio::test]
    async fn test_run_returns_last_error_when_exhausted() {
        let sleeper = RecordingSleeper::default();
        let result: Result<(), String> = RetryPolicy::immediate(5)
            .run(&sleeper, |_| true, |attempt| async move { Err(format!("attempt {attempt}")) })
            .await;

        assert_eq!(result, Err("attempt 5".to_string()));
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_non_retryable_error() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = RetryPolicy::fixed(5, Duration::from_secs(1))
            .run(&sleeper, |e: &&str| *e != "fatal", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            })
            .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.slept().is_empty());
    }
}

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Bounded exponential-backoff retry for a single async operation.
///
/// The wrapped operation is invoked up to `max_retries + 1` times. The delay
/// before attempt `n + 1` is `min(max_timeout, min_timeout * backoff_factor^(n-1))`,
/// optionally randomized within `[0, delay]` to avoid synchronized retry storms.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    pub randomize: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2.0,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::from_secs(30),
            randomize: true,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed attempt (1-based attempt number).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.min_timeout.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let capped = raw.min(self.max_timeout.as_millis() as f64).max(0.0);
        let millis = if self.randomize {
            rand::thread_rng().gen_range(0.0..=capped)
        } else {
            capped
        };
        Duration::from_millis(millis as u64)
    }

    /// Run `op`, retrying on failure until it succeeds or the retry budget is
    /// exhausted. The final error is the operation's own last error, never a
    /// synthetic "retries exhausted" one.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt > self.max_retries {
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_factor: 2.0,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::from_secs(30),
            randomize: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_the_last_real_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), &str> = policy(3)
            .run(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("downstream exploded") }
            })
            .await;

        assert_eq!(result, Err("downstream exploded"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_a_later_attempt_with_exponential_delays() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();

        let result: Result<u32, &str> = policy(3)
            .run(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if n < 4 { Err("not yet") } else { Ok(n) } }
            })
            .await;

        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Three failures back off 1000ms, 2000ms and 4000ms.
        assert_eq!(started.elapsed(), Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_without_sleeping() {
        let started = Instant::now();

        let result: Result<&str, &str> = policy(5).run(|| async { Ok("done") }).await;

        assert_eq!(result, Ok("done"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn delay_is_capped_at_max_timeout() {
        let mut p = policy(10);
        p.max_timeout = Duration::from_millis(2500);
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(2500));
        assert_eq!(p.delay_for_attempt(8), Duration::from_millis(2500));
    }

    #[test]
    fn jitter_stays_within_the_computed_delay() {
        let mut p = policy(10);
        p.randomize = true;
        for attempt in 1..=5 {
            let ceiling = Duration::from_millis(1000 * 2u64.pow(attempt - 1)).min(p.max_timeout);
            for _ in 0..50 {
                assert!(p.delay_for_attempt(attempt) <= ceiling);
            }
        }
    }
}

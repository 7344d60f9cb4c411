use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Consecutive half-open successes required before the circuit fully closes.
pub const REQUIRED_HALF_OPEN_SUCCESSES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in `Closed` before the circuit trips.
    pub failure_threshold: u32,
    /// Every call allowed through is raced against this timeout.
    pub call_timeout: Duration,
    /// How long the circuit stays `Open` before allowing a probe through.
    pub open_reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            call_timeout: Duration::from_secs(60),
            open_reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E: fmt::Display + fmt::Debug> {
    #[error("circuit breaker is open, call rejected")]
    Open,
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Inner(E),
}

/// Read-only view of the breaker for health checks and logs.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_successes: u32,
    /// Seconds since the most recent recorded failure, if any.
    pub seconds_since_last_failure: Option<f64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    half_open_successes: u32,
}

/// Circuit breaker protecting one external dependency.
///
/// Closed calls pass through; `failure_threshold` consecutive failures trip
/// the circuit open, after which calls are rejected without executing until
/// `open_reset_timeout` has elapsed. The first call after that window runs as
/// a half-open probe: one probe failure reopens the circuit immediately,
/// while [`REQUIRED_HALF_OPEN_SUCCESSES`] successes close it again.
///
/// State lives behind a mutex so the breaker stays correct when shared across
/// worker threads; critical sections never hold the lock across an await.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                half_open_successes: 0,
            }),
        }
    }

    /// Run `op` under the breaker, racing it against the configured call
    /// timeout. A timed-out call counts as a failure and its future is
    /// dropped, cancelling whatever work it had in flight.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        self.check_gate()?;

        match tokio::time::timeout(self.config.call_timeout, op()).await {
            Ok(Ok(value)) => {
                self.on_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.on_failure();
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                self.on_failure();
                Err(BreakerError::Timeout(self.config.call_timeout))
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_successes: inner.half_open_successes,
            seconds_since_last_failure: inner.last_failure_at.map(|at| at.elapsed().as_secs_f64()),
        }
    }

    /// Force the breaker back to `Closed` with all counters zeroed. An
    /// operational escape hatch, never part of the automatic failure path.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_successes = 0;
        inner.last_failure_at = None;
    }

    fn check_gate<E: fmt::Display + fmt::Debug>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }
        let reset_elapsed = inner
            .last_failure_at
            .map(|at| at.elapsed() > self.config.open_reset_timeout)
            .unwrap_or(true);
        if reset_elapsed {
            inner.state = CircuitState::HalfOpen;
            inner.half_open_successes = 0;
            info!("circuit breaker entering half-open probation");
            Ok(())
        } else {
            Err(BreakerError::Open)
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= REQUIRED_HALF_OPEN_SUCCESSES {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    info!("circuit breaker closed after successful probation");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        failures = inner.failure_count,
                        "circuit breaker tripped open"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!("half-open probe failed, circuit breaker reopened");
            }
            CircuitState::Open => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .expect("circuit breaker state lock poisoned")
    }
}

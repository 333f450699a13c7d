//! Circuit breaker guarding one provider model
//!
//! `Closed` passes calls through and counts consecutive failures. Reaching
//! the threshold opens the circuit: calls are rejected without provider
//! contact until the reset timeout elapses, after which exactly one trial
//! call is admitted (`HalfOpen`). Trial success closes the circuit and zeroes
//! the counters; trial failure re-opens it and restarts the timer.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Rejected without provider contact: the circuit is open
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker is open for '{target}'")]
pub struct CircuitOpen {
    pub target: String,
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// How a call was admitted through the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, normal call
    Normal,
    /// Half-open trial: the single probe allowed after the reset timeout
    Trial,
}

#[derive(Debug)]
struct CircuitInner {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    target: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(target: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            target: target.into(),
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(CircuitInner {
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                opened_at: None,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Ask permission to make a call
    pub fn try_acquire(&self) -> Result<Admission, CircuitOpen> {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");

        match inner.status {
            CircuitStatus::Closed => Ok(Admission::Normal),
            CircuitStatus::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);

                if elapsed >= self.reset_timeout {
                    inner.status = CircuitStatus::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(Admission::Trial)
                } else {
                    Err(CircuitOpen {
                        target: self.target.clone(),
                    })
                }
            }
            CircuitStatus::HalfOpen => {
                if inner.trial_in_flight {
                    Err(CircuitOpen {
                        target: self.target.clone(),
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(Admission::Trial)
                }
            }
        }
    }

    /// Report a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.status = CircuitStatus::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    /// Report a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.last_failure_at = Some(Instant::now());

        match inner.status {
            CircuitStatus::HalfOpen => {
                inner.status = CircuitStatus::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
            }
            CircuitStatus::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.status = CircuitStatus::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            // A call admitted just before the circuit opened; the timer
            // already restarted, only the counter moves.
            CircuitStatus::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    /// Report that an admitted call was never made (e.g. rate-limited)
    ///
    /// Frees a half-open trial slot without counting success or failure.
    pub fn record_abandoned(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        if inner.status == CircuitStatus::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.inner
            .lock()
            .expect("circuit breaker lock poisoned")
            .status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("circuit breaker lock poisoned")
            .consecutive_failures
    }

    /// Milliseconds since the most recent failure, if any
    pub fn last_failure_age_ms(&self) -> Option<u64> {
        self.inner
            .lock()
            .expect("circuit breaker lock poisoned")
            .last_failure_at
            .map(|t| t.elapsed().as_millis() as u64)
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

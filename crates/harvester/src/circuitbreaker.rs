//! Pool-wide circuit breaker for sustained fetch failure.
//!
//! Every worker reports the final outcome of each fetch (after retries). The
//! breaker opens once `failure_threshold` outcomes in a row were failures; any
//! success in between resets the streak. An open breaker never closes again:
//! the pool treats it as "the source is gone" and asks the collector to shut
//! down gracefully.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;

/// Default number of consecutive failed fetches that opens the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Fetches are flowing; failures are being counted.
    Closed,
    /// Sustained failure detected.
    Open,
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed fetches (after retries) required to open the circuit.
    pub failure_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// A thread-safe circuit breaker shared by all workers.
pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicU32::new(0),
            config,
        }
    }

    /// Records a successful fetch, resetting the failure streak.
    pub fn record_success(&self) {
        if self.state.load(Ordering::Acquire) == STATE_CLOSED {
            self.failure_count.store(0, Ordering::Release);
        }
    }

    /// Records a failed fetch.
    ///
    /// Returns true only for the call that moved the breaker from closed to
    /// open, so exactly one worker reports the trip.
    pub fn record_failure(&self) -> bool {
        if self.state.load(Ordering::Acquire) == STATE_OPEN {
            return false;
        }
        let prev = self.failure_count.fetch_add(1, Ordering::AcqRel);
        if prev + 1 >= self.config.failure_threshold {
            return self
                .state
                .compare_exchange(STATE_CLOSED, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        }
        false
    }

    /// True while fetches may proceed.
    pub fn can_execute(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    /// Returns the current failure streak.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

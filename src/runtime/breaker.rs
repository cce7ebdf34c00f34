//! Circuit breaker for connection attempts.
//!
//! Opens after a run of consecutive failures and blocks further attempts.
//! There is no background timer: the breaker is only re-evaluated when an
//! attempt is requested, and closes then if the cool-down has elapsed since
//! the last recorded failure.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info};

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    /// Normal operation; connections are allowed.
    Closed,
    /// Too many consecutive failures; connections blocked.
    Open,
}

/// Outcome of asking the breaker whether an attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerCheck {
    /// Closed; go ahead.
    Allowed,
    /// Was open, cool-down elapsed, now closed; go ahead.
    Reset,
    /// Still open for at least `remaining`.
    Blocked { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    reset_after: Duration,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    state: CircuitState,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, reset_after: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            reset_after,
            consecutive_failures: 0,
            last_failure: None,
            state: CircuitState::Closed,
        }
    }

    #[must_use]
    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_millis(config.reset_after_ms),
        )
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Record a failed attempt. Returns `true` if this failure opened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        if self.state == CircuitState::Closed && self.consecutive_failures >= self.threshold {
            self.state = CircuitState::Open;
            error!(
                failures = self.consecutive_failures,
                cooldown_secs = self.reset_after.as_secs(),
                "Circuit breaker opened, blocking connection attempts"
            );
            return true;
        }
        false
    }

    /// A connection opened; the failure run is over.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
    }

    /// What [`check`](Self::check) would decide at `now`, without closing
    /// the breaker.
    #[must_use]
    pub fn peek(&self, now: Instant) -> BreakerCheck {
        if self.state == CircuitState::Closed {
            return BreakerCheck::Allowed;
        }

        let since_failure = self
            .last_failure
            .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
        if since_failure >= self.reset_after {
            BreakerCheck::Reset
        } else {
            BreakerCheck::Blocked {
                remaining: self.reset_after - since_failure,
            }
        }
    }

    /// Lazily re-evaluate the breaker for an attempt at `now`.
    pub fn check(&mut self, now: Instant) -> BreakerCheck {
        let check = self.peek(now);
        if check == BreakerCheck::Reset {
            info!(
                idle_secs = self
                    .last_failure
                    .map_or(0, |at| now.saturating_duration_since(at).as_secs()),
                "Circuit breaker cool-down elapsed, allowing connection"
            );
            self.reset();
        }
        check
    }

    /// Close the breaker and forget the failure run.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.state = CircuitState::Closed;
    }
}

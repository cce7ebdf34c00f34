//! Connection bookkeeping and the decisions made from it.
//!
//! [`ConnectionState`] holds no I/O and no timers. The driver feeds it events
//! with an explicit `now` and acts on what it returns, which keeps every rule
//! here testable without a runtime.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::backoff::Backoff;
use super::breaker::{BreakerCheck, CircuitBreaker};
use super::event::ConnectionSnapshot;
use crate::config::ClientConfig;
use crate::domain::ConnectionPhase;

/// Who asked for a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOrigin {
    /// A caller invoked `connect()`. Subject to every gate.
    Requested,
    /// A reconnect timer fired. Its delay and attempt budget were settled when
    /// it was scheduled, so rate limiting and the attempt cap are skipped.
    Scheduled,
}

/// Why a connection attempt did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    AlreadyActive { phase: ConnectionPhase },
    CircuitOpen { remaining_ms: u64 },
    AttemptsExhausted { attempts: u32, max: u32 },
    RateLimited { since_last_ms: u64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("client is disabled"),
            Self::AlreadyActive { phase } => write!(f, "connection already {phase}"),
            Self::CircuitOpen { remaining_ms } => {
                write!(f, "circuit breaker open for another {remaining_ms}ms")
            }
            Self::AttemptsExhausted { attempts, max } => {
                write!(f, "reconnect attempts exhausted ({attempts}/{max})")
            }
            Self::RateLimited { since_last_ms } => {
                write!(f, "previous attempt only {since_last_ms}ms ago")
            }
        }
    }
}

/// Result of a `connect()` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    /// A transport is being opened to `url`.
    Started { url: String },
    Skipped(SkipReason),
}

impl ConnectOutcome {
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// What to do after a failed attempt or abnormal close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPlan {
    /// Arm the reconnect timer. `attempt` is the counter after incrementing.
    Schedule { attempt: u32, delay: Duration },
    /// Attempt budget is spent.
    Exhausted { attempts: u32 },
    /// Breaker is open; nothing is scheduled.
    BreakerOpen,
}

/// Mutable connection state owned by one client.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    phase: ConnectionPhase,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
    breaker: CircuitBreaker,
    backoff: Backoff,
    last_attempt: Option<Instant>,
    min_attempt_interval: Duration,
    enabled: bool,
}

impl ConnectionState {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            phase: ConnectionPhase::Closed,
            reconnect_attempts: 0,
            max_reconnect_attempts: config.max_reconnect_attempts,
            breaker: CircuitBreaker::from_config(&config.circuit_breaker),
            backoff: Backoff::from_config(config),
            last_attempt: None,
            min_attempt_interval: config.min_attempt_interval(),
            enabled: config.enabled,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    #[must_use]
    pub const fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    #[must_use]
    pub const fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether automatic reconnection can still happen.
    #[must_use]
    pub fn can_reconnect(&self) -> bool {
        !self.breaker.is_open() && self.reconnect_attempts < self.max_reconnect_attempts
    }

    /// Move to `next`.
    pub fn transition(&mut self, next: ConnectionPhase) {
        if self.phase == next {
            return;
        }
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "Unexpected phase transition");
            debug_assert!(false, "illegal phase transition {} -> {}", self.phase, next);
        }
        debug!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
    }

    /// Decide whether an attempt may start at `now`.
    ///
    /// Gates run in order: enabled flag, phase, circuit breaker, attempt
    /// budget, rate limit. A breaker whose cool-down has elapsed is closed
    /// only once every gate has passed.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] of the first gate that rejects the attempt.
    pub fn gate(
        &mut self,
        origin: AttemptOrigin,
        now: Instant,
    ) -> Result<BreakerCheck, SkipReason> {
        if !self.enabled {
            return Err(SkipReason::Disabled);
        }
        if self.phase.is_active() {
            return Err(SkipReason::AlreadyActive { phase: self.phase });
        }

        if let BreakerCheck::Blocked { remaining } = self.breaker.peek(now) {
            return Err(SkipReason::CircuitOpen {
                remaining_ms: duration_ms(remaining),
            });
        }

        if origin == AttemptOrigin::Requested {
            if self.reconnect_attempts >= self.max_reconnect_attempts {
                return Err(SkipReason::AttemptsExhausted {
                    attempts: self.reconnect_attempts,
                    max: self.max_reconnect_attempts,
                });
            }
            if let Some(last) = self.last_attempt {
                let since = now.saturating_duration_since(last);
                if since < self.min_attempt_interval {
                    return Err(SkipReason::RateLimited {
                        since_last_ms: duration_ms(since),
                    });
                }
            }
        }

        Ok(self.breaker.check(now))
    }

    /// An attempt passed the gate and a transport is being opened.
    pub fn begin_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
        self.transition(ConnectionPhase::Connecting);
    }

    /// The transport reached open.
    pub fn on_open(&mut self) {
        self.transition(ConnectionPhase::Open);
        self.reconnect_attempts = 0;
        self.breaker.record_success();
    }

    /// An attempt failed or an open connection closed abnormally.
    ///
    /// Returns `true` if this failure opened the circuit breaker.
    pub fn on_failure(&mut self, now: Instant) -> bool {
        self.transition(ConnectionPhase::Closed);
        self.breaker.record_failure(now)
    }

    /// The server closed the connection on purpose.
    pub fn on_intentional_close(&mut self) {
        self.transition(ConnectionPhase::Closed);
    }

    /// Decide the follow-up to a failure, consuming one attempt if scheduled.
    pub fn plan_reconnect(&mut self) -> ReconnectPlan {
        if self.breaker.is_open() {
            return ReconnectPlan::BreakerOpen;
        }
        if self.reconnect_attempts >= self.max_reconnect_attempts {
            return ReconnectPlan::Exhausted {
                attempts: self.reconnect_attempts,
            };
        }
        let delay = self.backoff.delay(self.reconnect_attempts);
        self.reconnect_attempts += 1;
        ReconnectPlan::Schedule {
            attempt: self.reconnect_attempts,
            delay,
        }
    }

    /// Clear attempts and breaker. The rate limit keeps counting from the
    /// last attempt.
    pub fn reset(&mut self) {
        self.reconnect_attempts = 0;
        self.breaker.reset();
    }

    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            phase: self.phase,
            reconnect_attempts: self.reconnect_attempts,
            max_reconnect_attempts: self.max_reconnect_attempts,
            circuit_breaker_open: self.breaker.is_open(),
            consecutive_failures: self.breaker.consecutive_failures(),
            can_reconnect: self.can_reconnect(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

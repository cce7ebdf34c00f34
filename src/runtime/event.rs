//! Notifications published by a client and the snapshots it exposes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::timers::TimerKind;
use crate::domain::{AppMessage, ClientId, ConnectionPhase};

/// Connection state as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionSnapshot {
    pub phase: ConnectionPhase,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Reported as last evaluated; an expired breaker still reads `true` until
    /// the next `connect()`.
    pub circuit_breaker_open: bool,
    pub consecutive_failures: u32,
    /// `false` once the client has given up and needs a forced reconnect.
    pub can_reconnect: bool,
}

impl ConnectionSnapshot {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }
}

/// Introspection data for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DebugSnapshot {
    #[serde(flatten)]
    pub connection: ConnectionSnapshot,
    pub enabled: bool,
    /// URL of the current or most recent attempt.
    pub url: Option<String>,
    pub client_id: Option<ClientId>,
    /// Identifier announced by the server in `connection_established`.
    pub server_client_id: Option<String>,
    pub armed_timers: Vec<TimerKind>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub messages_received: u64,
    pub messages_sent: u64,
}

/// Failure reported on the event channel. Never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionError {
    #[error("connection attempt failed: {reason}")]
    ConnectFailed { reason: String },

    #[error("connection not established within {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    #[error("connection closed abnormally (code {code}): {reason}")]
    AbnormalClose { code: u16, reason: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("could not decode message: {reason}")]
    Decode { reason: String },
}

impl ConnectionError {
    /// Whether this failure counts against the breaker and attempt budget.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        !matches!(self, Self::Decode { .. } | Self::Transport { .. })
    }
}

/// Event published to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    StateChanged(ConnectionSnapshot),
    Opened { url: String },
    Closed { code: u16, reason: String },
    Message(AppMessage),
    Error(ConnectionError),
    ReconnectScheduled { attempt: u32, delay_ms: u64 },
    ReconnectExhausted { attempts: u32 },
    CircuitBreakerOpened { failures: u32 },
    CircuitBreakerClosed,
}

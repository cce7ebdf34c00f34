//! Reconnection policy and the client task that applies it.

pub mod backoff;
pub mod breaker;
pub mod client;
mod driver;
pub mod event;
pub mod state;
pub mod timers;

pub use backoff::Backoff;
pub use breaker::{BreakerCheck, CircuitBreaker};
pub use client::ReconnectingClient;
pub use event::{ClientEvent, ConnectionError, ConnectionSnapshot, DebugSnapshot};
pub use state::{AttemptOrigin, ConnectOutcome, ConnectionState, ReconnectPlan, SkipReason};
pub use timers::{TimerKind, TimerRegistry};

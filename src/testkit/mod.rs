//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`connector`]: [`ScriptedConnector`](connector::ScriptedConnector), an
//!   in-memory [`Connector`](crate::adapter::Connector) whose attempts
//!   succeed, fail or hang on cue.
//! - [`events`]: helpers for waiting on [`ClientEvent`](crate::runtime::ClientEvent)s.
//! - [`config`]: canonical client configurations.

pub mod config;
pub mod connector;
pub mod events;

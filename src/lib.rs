//! Resocket - a WebSocket message client that keeps its connection alive.
//!
//! A [`ReconnectingClient`](runtime::ReconnectingClient) owns one logical
//! connection to a message server. When the connection drops unexpectedly it
//! reconnects with exponential backoff and jitter, stops after a bounded
//! number of attempts, and trips a circuit breaker after repeated failures.
//! Callers send JSON messages synchronously and receive application messages
//! and connection events over a broadcast channel.
//!
//! # Modules
//!
//! - [`domain`] - Transport-agnostic types: phases, close codes, messages
//! - [`runtime`] - Backoff, circuit breaker, timers and the client task
//! - [`adapter`] - The transport seam and its WebSocket implementation
//! - [`config`] - Configuration loading from TOML files
//! - [`cli`] - The `resocket` command-line interface
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Scripted connectors and helpers for integration tests
//!
//! # Example
//!
//! ```no_run
//! use resocket::config::ClientConfig;
//! use resocket::runtime::{ClientEvent, ReconnectingClient};
//! use serde_json::json;
//!
//! # async fn run() -> resocket::error::Result<()> {
//! let config = ClientConfig::new("ws://localhost:8000/ws/{client_id}");
//! let client = ReconnectingClient::websocket(config);
//! let mut events = client.subscribe();
//! client.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Opened { .. } => {
//!             client.send(&json!({"type": "chat", "text": "hello"}));
//!         }
//!         ClientEvent::Message(message) => println!("{}: {}", message.kind, message.payload),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod runtime;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

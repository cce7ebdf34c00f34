//! Transport-agnostic types: phases, close codes, identifiers and messages.

pub mod client_id;
pub mod close;
pub mod message;
pub mod phase;

pub use client_id::ClientId;
pub use message::{AppMessage, DecodeError, InboundMessage, OutboundMessage};
pub use phase::ConnectionPhase;

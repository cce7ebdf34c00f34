//! Transport adapters.

pub mod transport;
pub mod websocket;

pub use transport::{Connector, Frame, Link, LinkPeer, TransportEvent};
pub use websocket::WebSocketConnector;

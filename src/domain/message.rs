//! Wire messages.
//!
//! Every frame is a JSON object carrying a `type` discriminator. A handful of
//! types are reserved for connection housekeeping and are consumed by the
//! client; everything else is forwarded to subscribers untouched.
//!
//! ```json
//! {"type":"ping","timestamp":1718000000000}
//! {"type":"connection_established","client_id":"client_k3j9x0a1b"}
//! {"type":"processing_progress","job_id":"42","progress":0.5}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Discriminator field name.
pub const TYPE_FIELD: &str = "type";

/// Reserved message types.
pub mod kinds {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    pub const ECHO: &str = "echo";
}

/// Heartbeat reply from the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Pong {
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Greeting sent by the server once the socket is accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectionEstablished {
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server echo of something we sent (diagnostics only).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Echo {
    #[serde(default, alias = "message")]
    pub data: Option<Value>,
}

/// Application-level message, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppMessage {
    /// Value of the `type` field.
    pub kind: String,
    /// The complete JSON object as received, `type` included.
    pub payload: Value,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Pong(Pong),
    ConnectionEstablished(ConnectionEstablished),
    Echo(Echo),
    /// Any type not reserved above.
    App(AppMessage),
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the frame is not JSON, not an object, has no
    /// string `type`, or a reserved type carries a malformed payload.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;

        let kind = match &value {
            Value::Object(map) => match map.get(TYPE_FIELD) {
                Some(Value::String(kind)) => kind.clone(),
                _ => return Err(DecodeError::MissingType),
            },
            _ => return Err(DecodeError::NotAnObject),
        };

        match kind.as_str() {
            kinds::PONG => Pong::deserialize(&value)
                .map(Self::Pong)
                .map_err(|e| DecodeError::payload(&kind, &e)),
            kinds::CONNECTION_ESTABLISHED => ConnectionEstablished::deserialize(&value)
                .map(Self::ConnectionEstablished)
                .map_err(|e| DecodeError::payload(&kind, &e)),
            kinds::ECHO => Echo::deserialize(&value)
                .map(Self::Echo)
                .map_err(|e| DecodeError::payload(&kind, &e)),
            _ => Ok(Self::App(AppMessage {
                kind,
                payload: value,
            })),
        }
    }
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingType,

    #[error("malformed `{kind}` message: {reason}")]
    Payload { kind: String, reason: String },
}

impl DecodeError {
    fn payload(kind: &str, err: &serde_json::Error) -> Self {
        Self::Payload {
            kind: kind.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Outbound message builder.
///
/// Serializes as a flat JSON object whose `type` field is the message kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutboundMessage(Map<String, Value>);

impl OutboundMessage {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(TYPE_FIELD.to_string(), Value::String(kind.into()));
        Self(map)
    }

    /// Liveness ping stamped with unix milliseconds.
    #[must_use]
    pub fn ping(timestamp_ms: i64) -> Self {
        Self::new(kinds::PING).with("timestamp", timestamp_ms)
    }

    /// Add a field. Setting `type` replaces the kind.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merge every field of a JSON object into the message.
    ///
    /// Non-object values are stored under `data`.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        match payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if key != TYPE_FIELD {
                        self.0.insert(key, value);
                    }
                }
            }
            Value::Null => {}
            other => {
                self.0.insert("data".to_string(), other);
            }
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        self.0
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

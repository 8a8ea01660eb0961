//! Wire protocol for relay-to-client communication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key used for the broadcast start annotation, both in envelopes and when
/// merged into raw feed payloads.
pub const BROADCAST_START_KEY: &str = "broadcast_start";

/// Enveloped message from relay to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Broadcast start time, sent once before feed data.
    BroadcastStart { broadcast_start: String },
    /// First batch of the polling fallback.
    Initial {
        data: Vec<Value>,
        broadcast_start: Option<String>,
    },
    /// Items observed since the previous batch.
    Update { data: Vec<Value> },
    /// Error message.
    Error { message: String },
}

impl RelayMessage {
    /// Create an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Anything the relay may write to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamFrame {
    /// Tagged relay envelope.
    Message(RelayMessage),
    /// Feed payload forwarded without an envelope.
    Raw(Value),
    /// Non-textual feed payload forwarded as-is.
    Binary(Vec<u8>),
}

impl DownstreamFrame {
    /// Serialize a textual frame to JSON. Returns `None` for binary frames.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<Option<String>, serde_json::Error> {
        match self {
            Self::Message(msg) => serde_json::to_string(msg).map(Some),
            Self::Raw(value) => serde_json::to_string(value).map(Some),
            Self::Binary(_) => Ok(None),
        }
    }
}

impl From<RelayMessage> for DownstreamFrame {
    fn from(msg: RelayMessage) -> Self {
        Self::Message(msg)
    }
}

/// Merge the broadcast start into a feed payload.
///
/// Only keyed structures are annotated; an existing key is overwritten.
#[must_use]
pub fn annotate(mut value: Value, broadcast_start: Option<&str>) -> Value {
    if let (Some(start), Value::Object(map)) = (broadcast_start, &mut value) {
        map.insert(BROADCAST_START_KEY.to_string(), Value::String(start.to_string()));
    }
    value
}

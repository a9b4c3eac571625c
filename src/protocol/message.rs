//! Wire message shapes.
//!
//! Every message on the wire is a tagged envelope:
//!
//! ```text
//! { "type": "<tag>", "data": { ... } | null }
//! ```
//!
//! # Example
//!
//! ```
//! use opwire_client::protocol::OutgoingMessage;
//!
//! let msg = OutgoingMessage::new("read-file-text").with("path", "/etc/hosts");
//! assert_eq!(msg.tag, "read-file-text");
//! assert_eq!(msg.data["path"], "/etc/hosts");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tags shared by every operation.
pub mod tags {
    /// Success without data.
    pub const OK: &str = "ok";
    /// Remote failure.
    pub const ERROR: &str = "error";
}

/// A request sent to the remote peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Request type tag.
    #[serde(rename = "type")]
    pub tag: String,
    /// Request fields.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl OutgoingMessage {
    /// Create a message with no fields.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: Map::new(),
        }
    }

    /// Set a field (builder style).
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.data.insert(field.to_string(), value.into());
        self
    }

    /// Set a field only when a value is given.
    pub fn with_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(field, v),
            None => self,
        }
    }
}

/// A response event received from the remote peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    /// Result type tag.
    #[serde(rename = "type")]
    pub tag: String,
    /// Result payload, if any.
    #[serde(default)]
    pub data: Option<Value>,
}

impl IncomingEvent {
    /// Create an event carrying data.
    pub fn new(tag: impl Into<String>, data: Value) -> Self {
        Self {
            tag: tag.into(),
            data: Some(data),
        }
    }

    /// Create an event without data.
    pub fn bare(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: None,
        }
    }

    /// Shorthand for an `ok` acknowledgment.
    pub fn ok() -> Self {
        Self::bare(tags::OK)
    }

    /// Shorthand for an error event with a description.
    pub fn error(description: impl Into<String>) -> Self {
        Self::new(
            tags::ERROR,
            serde_json::json!({ "description": description.into() }),
        )
    }
}

/// One message or a batch of messages submitted together.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// A single message.
    One(OutgoingMessage),
    /// Several messages dispatched as one batch.
    Batch(Vec<OutgoingMessage>),
}

impl Request {
    /// Flatten into the list of messages to dispatch.
    pub fn into_messages(self) -> Vec<OutgoingMessage> {
        match self {
            Request::One(msg) => vec![msg],
            Request::Batch(msgs) => msgs,
        }
    }
}

impl From<OutgoingMessage> for Request {
    fn from(msg: OutgoingMessage) -> Self {
        Request::One(msg)
    }
}

impl From<Vec<OutgoingMessage>> for Request {
    fn from(msgs: Vec<OutgoingMessage>) -> Self {
        Request::Batch(msgs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outgoing_serializes_type_field() {
        let msg = OutgoingMessage::new("exists").with("path", "a.txt");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({ "type": "exists", "data": { "path": "a.txt" } }));
    }

    #[test]
    fn test_with_opt_skips_none() {
        let msg = OutgoingMessage::new("create-dir")
            .with("path", "d")
            .with_opt("all", None::<bool>);
        assert!(!msg.data.contains_key("all"));

        let msg = msg.with_opt("all", Some(true));
        assert_eq!(msg.data["all"], json!(true));
    }

    #[test]
    fn test_incoming_without_data() {
        let event: IncomingEvent = serde_json::from_value(json!({ "type": "ok" })).unwrap();
        assert_eq!(event, IncomingEvent::ok());

        let event: IncomingEvent =
            serde_json::from_value(json!({ "type": "error", "data": null })).unwrap();
        assert_eq!(event.data, None);
    }

    #[test]
    fn test_request_flattening() {
        let one: Request = OutgoingMessage::new("a").into();
        assert_eq!(one.into_messages().len(), 1);

        let batch: Request = vec![OutgoingMessage::new("a"), OutgoingMessage::new("a")].into();
        assert_eq!(batch.into_messages().len(), 2);
    }
}

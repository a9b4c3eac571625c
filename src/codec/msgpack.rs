//! MsgPack codec using `rmp-serde`.
//!
//! **CRITICAL**: Always use `to_vec_named`, NEVER `to_vec`!
//! Peers decode envelopes as maps keyed by field name; `to_vec` would write
//! structs as positional arrays.
//!
//! # Example
//!
//! ```
//! use opwire_client::codec::MsgPackCodec;
//! use opwire_client::protocol::IncomingEvent;
//!
//! let bytes = MsgPackCodec::encode(&IncomingEvent::error("boom")).unwrap();
//! let event = MsgPackCodec::decode_event(&bytes).unwrap();
//! assert_eq!(event, IncomingEvent::error("boom"));
//! ```

use crate::error::Result;
use crate::protocol::{IncomingEvent, OutgoingMessage};

/// MessagePack codec for message envelopes.
///
/// Uses `rmp_serde::to_vec_named` so structs are serialized as maps
/// (with field names) rather than arrays (positional).
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        // CRITICAL: to_vec_named, NOT to_vec!
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Encode a batch as an array of envelopes.
    pub fn encode_batch(messages: &[OutgoingMessage]) -> Result<Vec<u8>> {
        Self::encode(&messages)
    }

    /// Decode one response envelope. `nil` data decodes as absent.
    pub fn decode_event(bytes: &[u8]) -> Result<IncomingEvent> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct RawEvent<'a> {
        #[serde(rename = "type")]
        tag: &'a str,
        data: Option<serde_json::Value>,
    }

    #[test]
    fn test_envelope_is_map_format() {
        let encoded = MsgPackCodec::encode(&OutgoingMessage::new("system-info")).unwrap();

        // fixmap with 2 elements; positional format would be 0x92
        assert_eq!(encoded[0], 0x82, "Expected fixmap with 2 elements");
    }

    #[test]
    fn test_batch_is_array() {
        let batch = [
            OutgoingMessage::new("remove").with("path", "a"),
            OutgoingMessage::new("remove").with("path", "b"),
        ];
        let encoded = MsgPackCodec::encode_batch(&batch).unwrap();
        assert_eq!(encoded[0], 0x92, "Expected fixarray with 2 elements");

        let decoded: Vec<OutgoingMessage> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_nil_data_decodes_absent() {
        let bytes = MsgPackCodec::encode(&RawEvent {
            tag: "ok",
            data: None,
        })
        .unwrap();

        let event = MsgPackCodec::decode_event(&bytes).unwrap();
        assert_eq!(event, IncomingEvent::ok());
    }

    #[test]
    fn test_nested_nil_survives_decode() {
        // Stripping nested nils is left to normalization.
        let bytes = MsgPackCodec::encode(&RawEvent {
            tag: "dir-entries",
            data: Some(json!({ "entries": [], "errors": null })),
        })
        .unwrap();

        let event = MsgPackCodec::decode_event(&bytes).unwrap();
        assert_eq!(
            event.data,
            Some(json!({ "entries": [], "errors": null }))
        );
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack";
        assert!(MsgPackCodec::decode_event(invalid).is_err());
    }

    #[test]
    fn test_number_types() {
        let bytes = MsgPackCodec::encode(&RawEvent {
            tag: "process-done",
            data: Some(json!({ "id": "1", "status": "exited", "code": -1 })),
        })
        .unwrap();

        let event = MsgPackCodec::decode_event(&bytes).unwrap();
        assert_eq!(event.data.unwrap()["code"], -1);
    }
}

//! JSON codec using `serde_json`.

use crate::error::Result;
use crate::protocol::{IncomingEvent, OutgoingMessage};

/// JSON codec for message envelopes.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode a batch as a JSON array of envelopes.
    pub fn encode_batch(messages: &[OutgoingMessage]) -> Result<Vec<u8>> {
        Self::encode(&messages)
    }

    /// Decode one response envelope.
    pub fn decode_event(bytes: &[u8]) -> Result<IncomingEvent> {
        Self::decode(bytes)
    }
}

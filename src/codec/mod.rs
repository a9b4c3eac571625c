//! Codec module - wire encoding of message envelopes.
//!
//! Transport implementors use these to put batches on the wire and to turn
//! received bytes back into [`IncomingEvent`](crate::protocol::IncomingEvent)s:
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (struct-as-map)
//! - [`JsonCodec`] - JSON using `serde_json`
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so a transport picks its wire format at compile time. Both decode the
//! absent-value sentinel (`nil` / `null`) to an absent `data` field.
//!
//! # Example
//!
//! ```
//! use opwire_client::codec::{JsonCodec, MsgPackCodec};
//! use opwire_client::protocol::OutgoingMessage;
//!
//! let batch = [OutgoingMessage::new("exists").with("path", "a.txt")];
//!
//! let packed = MsgPackCodec::encode_batch(&batch).unwrap();
//! let text = JsonCodec::encode_batch(&batch).unwrap();
//! assert_eq!(text, br#"[{"type":"exists","data":{"path":"a.txt"}}]"#);
//! assert!(packed.len() < text.len());
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

//! # opwire-client
//!
//! Typed client-side dispatch for a tagged remote-operation protocol.
//!
//! Every message on the wire is a `{type, data}` envelope. This crate turns
//! those envelopes into typed operations that can be consumed two ways:
//! through a callback that sees every reply, or by waiting for the first
//! reply (awaited or blocking), bounded by a timeout.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): envelopes, schemas, response classification
//! - **Operations** ([`operation`]): descriptor + interceptor + transport
//! - **Sessions** ([`session`]): process and watch streams built on operations
//! - **Transport** ([`transport`]): the seam to the wire; [`codec`] for bytes
//!
//! ## Example
//!
//! ```
//! use opwire_client::protocol::IncomingEvent;
//! use opwire_client::transport::LoopbackTransport;
//! use opwire_client::Client;
//!
//! let transport = LoopbackTransport::with_responder(|batch| {
//!     assert_eq!(batch[0].tag, "exists");
//!     vec![IncomingEvent::new("exists", serde_json::json!({ "value": true }))]
//! });
//! let client = Client::builder(transport).build();
//!
//! let exists = client.exists("Cargo.toml").blocking().into_result().unwrap();
//! assert!(exists);
//! ```

pub mod catalog;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod operation;
pub mod protocol;
pub mod session;
pub mod transport;

mod client;

pub use client::{Client, ClientBuilder};
pub use config::{CallOptions, Settings, SettingsProvider};
pub use error::{OpwireError, Result, ValidationError};
pub use operation::{Operation, PreparedCall, Reply};
pub use session::{ProcessHandle, WatchEvent};
pub use transport::{StopHandle, Transport};

//! Protocol module - message shapes, schemas and response classification.
//!
//! This module implements the local half of the tagged message protocol:
//! - [`OutgoingMessage`] / [`IncomingEvent`] envelopes
//! - [`Schema`] validation of request and response fields
//! - [`parse`] / [`parse_with`] classification of responses
//! - [`normalize`] stripping of the absent-value sentinel

mod message;
mod normalize;
mod parser;
mod schema;

pub use message::{tags, IncomingEvent, OutgoingMessage, Request};
pub use normalize::{normalize, normalize_event};
pub use parser::{parse, parse_with, MISSING_DATA, MISSING_DESCRIPTION};
pub use schema::{FieldKind, FieldSpec, Schema};

pub(crate) use parser::classify;

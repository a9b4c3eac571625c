//! Static description of one remote operation.
//!
//! A descriptor names the request tag, the accepted result tags, optional
//! request and response schemas, the multiplicity flag and the mapping from a
//! raw success payload to the typed value handed on to callers. It is built
//! once and shared by every call.
//!
//! # Example
//!
//! ```
//! use opwire_client::operation::OperationDescriptor;
//! use opwire_client::protocol::FieldKind;
//!
//! let copy = OperationDescriptor::ack("copy")
//!     .field("src", FieldKind::String)
//!     .field("dst", FieldKind::String);
//!
//! assert_eq!(copy.request_tag(), "copy");
//! assert_eq!(copy.expected_tags(), ["ok"]);
//! assert!(!copy.is_multiplicity());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{OpwireError, Result};
use crate::protocol::{classify, normalize_event, tags, FieldKind, IncomingEvent, Schema};
use crate::transport::StopHandle;

/// Mapping from a raw success payload to the operation's value.
///
/// Receives the normalized data (`true` for `ok`), the matched tag and the
/// subscription's stop handle.
pub type MapFn<T> = Arc<dyn Fn(Option<Value>, &str, &StopHandle) -> Result<T> + Send + Sync>;

/// Static description of an operation.
pub struct OperationDescriptor<T> {
    request_tag: String,
    expected: Vec<String>,
    request_schema: Option<Schema>,
    response_schemas: HashMap<String, Schema>,
    multiplicity: bool,
    map: MapFn<T>,
}

impl<T: Send + 'static> OperationDescriptor<T> {
    /// Create a descriptor with a mapping function.
    pub fn new<F>(request_tag: &str, expected: &[&str], map: F) -> Self
    where
        F: Fn(Option<Value>, &str, &StopHandle) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            request_tag: request_tag.to_string(),
            expected: expected.iter().map(|t| t.to_string()).collect(),
            request_schema: None,
            response_schemas: HashMap::new(),
            multiplicity: false,
            map: Arc::new(map),
        }
    }

    /// Declare a required request field.
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        let schema = self.take_request_schema();
        self.request_schema = Some(schema.field(name, kind));
        self
    }

    /// Declare an optional request field.
    pub fn optional(mut self, name: &str, kind: FieldKind) -> Self {
        let schema = self.take_request_schema();
        self.request_schema = Some(schema.optional(name, kind));
        self
    }

    /// Replace the request schema wholesale.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.request_schema = Some(schema);
        self
    }

    fn take_request_schema(&mut self) -> Schema {
        self.request_schema
            .take()
            .unwrap_or_else(|| Schema::new(self.request_tag.clone()))
    }

    /// Declare the schema for responses tagged `schema.tag()`.
    pub fn response_schema(mut self, schema: Schema) -> Self {
        self.response_schemas
            .insert(schema.tag().to_string(), schema);
        self
    }

    /// Expect a stream of events per request.
    pub fn multiplicity(mut self, multiplicity: bool) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Request type tag.
    pub fn request_tag(&self) -> &str {
        &self.request_tag
    }

    /// Accepted result tags.
    pub fn expected_tags(&self) -> &[String] {
        &self.expected
    }

    /// Request schema, if declared.
    pub fn request_schema(&self) -> Option<&Schema> {
        self.request_schema.as_ref()
    }

    /// Whether a request yields a stream of events.
    pub fn is_multiplicity(&self) -> bool {
        self.multiplicity
    }

    /// Normalize, validate and classify one incoming event.
    ///
    /// A response that fails its schema stops the subscription.
    pub(crate) fn handle_event(&self, event: IncomingEvent, stop: &StopHandle) -> Result<T> {
        let event = normalize_event(event);
        tracing::trace!(op = %self.request_tag, tag = %event.tag, "event received");

        if let (Some(schema), Some(data)) =
            (self.response_schemas.get(&event.tag), event.data.as_ref())
        {
            if let Err(err) = schema.validate_data(data) {
                tracing::warn!(
                    op = %self.request_tag,
                    tag = %event.tag,
                    error = %err,
                    "response failed validation, stopping subscription"
                );
                stop.stop();
                return Err(err.into());
            }
        }

        classify(event, &self.expected, |data, tag| (self.map)(data, tag, stop))
    }
}

impl OperationDescriptor<()> {
    /// Operation answered by a bare `ok`.
    pub fn ack(request_tag: &str) -> Self {
        Self::new(request_tag, &[tags::OK], |_, _, _| Ok(()))
    }
}

impl<T: DeserializeOwned + Send + 'static> OperationDescriptor<T> {
    /// Operation whose `result_tag` payload deserializes into `T`.
    pub fn decoding(request_tag: &str, result_tag: &str) -> Self {
        Self::new(request_tag, &[result_tag], |data, tag, _| decode_data(data, tag))
    }
}

/// Deserialize a success payload, mapping failures to protocol errors.
pub fn decode_data<T: DeserializeOwned>(data: Option<Value>, tag: &str) -> Result<T> {
    let data = data.ok_or_else(|| {
        OpwireError::Protocol(format!("'{}' response received without data", tag))
    })?;
    serde_json::from_value(data)
        .map_err(|e| OpwireError::Protocol(format!("malformed '{}' response: {}", tag, e)))
}

//! Message schemas and validation.
//!
//! A [`Schema`] is built once, when an operation is constructed, and checked
//! against every message of that operation. Request schemas also pin the
//! message tag; response schemas are keyed by the result tag they apply to.
//!
//! # Example
//!
//! ```
//! use opwire_client::protocol::{FieldKind, OutgoingMessage, Schema};
//!
//! let schema = Schema::new("append-file-text")
//!     .field("path", FieldKind::String)
//!     .field("text", FieldKind::String);
//!
//! let ok = OutgoingMessage::new("append-file-text")
//!     .with("path", "log.txt")
//!     .with("text", "hello");
//! assert!(schema.validate_message(&ok).is_ok());
//!
//! let missing = OutgoingMessage::new("append-file-text").with("text", "hello");
//! assert!(schema.validate_message(&missing).is_err());
//! ```

use serde_json::{Map, Value};

use super::OutgoingMessage;
use crate::error::ValidationError;

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// JSON object.
    Mapping,
    /// JSON array.
    Sequence,
}

impl FieldKind {
    /// Human readable name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Mapping => "mapping",
            FieldKind::Sequence => "sequence",
        }
    }

    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldKind::String, Value::String(_))
                | (FieldKind::Number, Value::Number(_))
                | (FieldKind::Boolean, Value::Bool(_))
                | (FieldKind::Mapping, Value::Object(_))
                | (FieldKind::Sequence, Value::Array(_))
        )
    }
}

/// Name of the kind of a JSON value, for error messages.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Declared field of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Expected primitive type.
    pub kind: FieldKind,
    /// Whether the field may be absent.
    pub optional: bool,
}

/// Field layout for one message tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    tag: String,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Create an empty schema for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            optional: false,
        });
        self
    }

    /// Add an optional field.
    pub fn optional(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            optional: true,
        });
        self
    }

    /// Tag this schema applies to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate an outgoing message: tag first, then fields.
    pub fn validate_message(&self, msg: &OutgoingMessage) -> Result<(), ValidationError> {
        if msg.tag != self.tag {
            return Err(ValidationError::TagMismatch {
                expected: self.tag.clone(),
                found: msg.tag.clone(),
            });
        }
        self.validate_fields(&msg.data)
    }

    /// Validate response data.
    ///
    /// A sequence is validated item by item; anything else is treated as a
    /// single item.
    pub fn validate_data(&self, data: &Value) -> Result<(), ValidationError> {
        match data {
            Value::Array(items) => items.iter().try_for_each(|item| self.validate_item(item)),
            item => self.validate_item(item),
        }
    }

    fn validate_item(&self, item: &Value) -> Result<(), ValidationError> {
        match item {
            Value::Object(map) => self.validate_fields(map),
            other => Err(ValidationError::NotAMapping {
                found: kind_of(other),
            }),
        }
    }

    fn validate_fields(&self, data: &Map<String, Value>) -> Result<(), ValidationError> {
        for spec in &self.fields {
            match data.get(&spec.name) {
                None | Some(Value::Null) if spec.optional => {}
                None | Some(Value::Null) => {
                    return Err(ValidationError::MissingField {
                        field: spec.name.clone(),
                    });
                }
                Some(value) if !spec.kind.matches(value) => {
                    return Err(ValidationError::WrongType {
                        field: spec.name.clone(),
                        expected: spec.kind.name(),
                        found: kind_of(value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn append_schema() -> Schema {
        Schema::new("append-file")
            .field("path", FieldKind::String)
            .field("data", FieldKind::Sequence)
    }

    #[test]
    fn test_valid_message() {
        let msg = OutgoingMessage::new("append-file")
            .with("path", "a")
            .with("data", json!([104, 105]));
        assert!(append_schema().validate_message(&msg).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let msg = OutgoingMessage::new("append-file").with("data", json!([]));
        assert_eq!(
            append_schema().validate_message(&msg),
            Err(ValidationError::MissingField {
                field: "path".to_string()
            })
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let msg = OutgoingMessage::new("append-file")
            .with("path", Value::Null)
            .with("data", json!([]));
        assert!(matches!(
            append_schema().validate_message(&msg),
            Err(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_wrong_type() {
        let msg = OutgoingMessage::new("append-file")
            .with("path", 5)
            .with("data", json!([]));
        assert_eq!(
            append_schema().validate_message(&msg),
            Err(ValidationError::WrongType {
                field: "path".to_string(),
                expected: "string",
                found: "number",
            })
        );
    }

    #[test]
    fn test_tag_mismatch() {
        let msg = OutgoingMessage::new("write-file")
            .with("path", "a")
            .with("data", json!([]));
        assert!(matches!(
            append_schema().validate_message(&msg),
            Err(ValidationError::TagMismatch { .. })
        ));
    }

    #[test]
    fn test_optional_field() {
        let schema = Schema::new("create-dir")
            .field("path", FieldKind::String)
            .optional("all", FieldKind::Boolean);

        let without = OutgoingMessage::new("create-dir").with("path", "d");
        assert!(schema.validate_message(&without).is_ok());

        let bad = without.clone().with("all", "yes");
        assert!(matches!(
            schema.validate_message(&bad),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_validate_data_sequence() {
        let schema = Schema::new("process-spawned").field("id", FieldKind::String);

        assert!(schema.validate_data(&json!({ "id": "1" })).is_ok());
        assert!(schema
            .validate_data(&json!([{ "id": "1" }, { "id": "2" }]))
            .is_ok());
        assert!(schema
            .validate_data(&json!([{ "id": "1" }, { "pid": 2 }]))
            .is_err());
        assert_eq!(
            schema.validate_data(&json!("nope")),
            Err(ValidationError::NotAMapping { found: "string" })
        );
    }

    #[test]
    fn test_extra_fields_allowed() {
        let schema = Schema::new("exists").field("path", FieldKind::String);
        let msg = OutgoingMessage::new("exists")
            .with("path", "a")
            .with("extra", 1);
        assert!(schema.validate_message(&msg).is_ok());
    }
}

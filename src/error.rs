//! Error types for opwire-client.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all opwire operations.
#[derive(Debug, Error)]
pub enum OpwireError {
    /// A message failed schema validation (local, never transmitted).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Response did not fit the protocol (unexpected tag, malformed error,
    /// undecodable payload).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error reported by the remote peer, surfaced verbatim.
    #[error("{0}")]
    Remote(String),

    /// A synchronous call was not resolved within its budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// `unwatch` was called for a path that has no watch session.
    #[error("Not watching path: {0}")]
    NotWatching(String),

    /// The transport refused to submit a batch.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

impl OpwireError {
    /// Returns `true` for a timed-out synchronous call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OpwireError::Timeout(_))
    }
}

/// A message did not match its declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The message tag differs from the operation's request tag.
    #[error("expected message type '{expected}', got '{found}'")]
    TagMismatch {
        /// Tag declared by the schema.
        expected: String,
        /// Tag carried by the message.
        found: String,
    },

    /// A required field is absent.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A field is present but holds the wrong primitive type.
    #[error("field '{field}' must be {expected}, got {found}")]
    WrongType {
        /// Field name.
        field: String,
        /// Declared kind.
        expected: &'static str,
        /// Kind actually found.
        found: &'static str,
    },

    /// Payload data was not a mapping (or a sequence of mappings).
    #[error("payload must be a mapping, got {found}")]
    NotAMapping {
        /// Kind actually found.
        found: &'static str,
    },
}

/// Result type alias using OpwireError.
pub type Result<T> = std::result::Result<T, OpwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_is_verbatim() {
        let err = OpwireError::Remote("boom".to_string());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_validation_error_wraps() {
        let err: OpwireError = ValidationError::MissingField {
            field: "path".to_string(),
        }
        .into();
        assert!(matches!(err, OpwireError::Validation(_)));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_is_timeout() {
        assert!(OpwireError::Timeout(Duration::from_millis(10)).is_timeout());
        assert!(!OpwireError::Protocol("x".to_string()).is_timeout());
    }
}

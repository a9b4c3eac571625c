//! Response classification.
//!
//! Every incoming event is classified against the set of result tags the
//! operation accepts:
//!
//! | event                              | outcome                         |
//! |------------------------------------|---------------------------------|
//! | `ok` (expected)                    | success, payload `true`         |
//! | other expected tag                 | success, payload = event data   |
//! | `error` with `description`         | [`OpwireError::Remote`]         |
//! | `error` with data, no description  | [`OpwireError::Protocol`]       |
//! | `error` without data               | [`OpwireError::Protocol`]       |
//! | anything else                      | [`OpwireError::Protocol`]       |
//!
//! Payloads are normalized (see [`normalize`](super::normalize)) before
//! classification.
//!
//! # Example
//!
//! ```
//! use opwire_client::protocol::{parse, IncomingEvent};
//! use serde_json::json;
//!
//! let value = parse(IncomingEvent::ok(), &["ok"]).unwrap();
//! assert_eq!(value, Some(json!(true)));
//!
//! let err = parse(IncomingEvent::error("boom"), &["ok"]).unwrap_err();
//! assert_eq!(err.to_string(), "boom");
//! ```

use serde_json::Value;

use super::normalize::normalize_event;
use super::{tags, IncomingEvent};
use crate::error::{OpwireError, Result};

/// Error text for an error event whose data lacks a description.
pub const MISSING_DESCRIPTION: &str = "error response received without description";

/// Error text for an error event without any data.
pub const MISSING_DATA: &str = "error response received without data payload";

/// Classify `event` and return its raw (normalized) payload on success.
pub fn parse<S: AsRef<str>>(event: IncomingEvent, expected: &[S]) -> Result<Option<Value>> {
    parse_with(event, expected, |data, _tag| Ok(data))
}

/// Classify `event` and hand a successful payload to `map`.
///
/// `map` receives the normalized data and the matched tag. For the `ok` tag
/// the data is the placeholder `true`.
pub fn parse_with<S, T, F>(event: IncomingEvent, expected: &[S], map: F) -> Result<T>
where
    S: AsRef<str>,
    F: FnOnce(Option<Value>, &str) -> Result<T>,
{
    classify(normalize_event(event), expected, map)
}

/// Classification on an already normalized event.
pub(crate) fn classify<S, T, F>(event: IncomingEvent, expected: &[S], map: F) -> Result<T>
where
    S: AsRef<str>,
    F: FnOnce(Option<Value>, &str) -> Result<T>,
{
    let IncomingEvent { tag, data } = event;
    let is_expected = expected.iter().any(|t| t.as_ref() == tag);

    if is_expected && tag == tags::OK {
        return map(Some(Value::Bool(true)), &tag);
    }
    if is_expected {
        return map(data, &tag);
    }
    if tag == tags::ERROR {
        return Err(match data {
            Some(data) => match data.get("description") {
                Some(Value::String(description)) => OpwireError::Remote(description.clone()),
                Some(description) => OpwireError::Remote(description.to_string()),
                None => OpwireError::Protocol(MISSING_DESCRIPTION.to_string()),
            },
            None => OpwireError::Protocol(MISSING_DATA.to_string()),
        });
    }

    let expected = expected
        .iter()
        .map(|t| format!("'{}'", t.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    Err(OpwireError::Protocol(format!(
        "received unexpected response type '{}', expected one of [{}]",
        tag, expected
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_is_true_placeholder() {
        let value = parse(IncomingEvent::ok(), &["ok"]).unwrap();
        assert_eq!(value, Some(json!(true)));
    }

    #[test]
    fn test_ok_with_data_still_placeholder() {
        let event = IncomingEvent::new("ok", json!({ "ignored": 1 }));
        assert_eq!(parse(event, &["ok"]).unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_expected_tag_passes_data() {
        let event = IncomingEvent::new("text", json!({ "data": "hello" }));
        let value = parse(event, &["text"]).unwrap();
        assert_eq!(value, Some(json!({ "data": "hello" })));
    }

    #[test]
    fn test_map_receives_tag() {
        let event = IncomingEvent::new("changed", json!({ "kind": "modify" }));
        let tag = parse_with(event, &["ok", "changed"], |_, tag| Ok(tag.to_string())).unwrap();
        assert_eq!(tag, "changed");
    }

    #[test]
    fn test_remote_error_description() {
        let err = parse(IncomingEvent::error("boom"), &["ok"]).unwrap_err();
        assert!(matches!(err, OpwireError::Remote(ref d) if d == "boom"));
    }

    #[test]
    fn test_error_without_description() {
        let event = IncomingEvent::new("error", json!({ "kind": "not_found" }));
        let err = parse(event, &["ok"]).unwrap_err();
        assert!(matches!(err, OpwireError::Protocol(ref m) if m == MISSING_DESCRIPTION));
    }

    #[test]
    fn test_error_without_data() {
        let err = parse(IncomingEvent::bare("error"), &["ok"]).unwrap_err();
        assert!(matches!(err, OpwireError::Protocol(ref m) if m == MISSING_DATA));
    }

    #[test]
    fn test_error_with_null_data_is_missing_data() {
        let event = IncomingEvent {
            tag: "error".to_string(),
            data: Some(Value::Null),
        };
        let err = parse(event, &["ok"]).unwrap_err();
        assert!(matches!(err, OpwireError::Protocol(ref m) if m == MISSING_DATA));
    }

    #[test]
    fn test_error_with_null_description() {
        let event = IncomingEvent::new("error", json!({ "description": null }));
        let err = parse(event, &["ok"]).unwrap_err();
        assert!(matches!(err, OpwireError::Protocol(ref m) if m == MISSING_DESCRIPTION));
    }

    #[test]
    fn test_unexpected_tag_names_both() {
        let err = parse(IncomingEvent::bare("foo"), &["ok"]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("foo"));
        assert!(message.contains("ok"));
    }

    #[test]
    fn test_expected_error_tag_is_success() {
        // An operation may list "error" itself as a result tag.
        let event = IncomingEvent::error("kept");
        let value = parse(event, &["error"]).unwrap();
        assert_eq!(value, Some(json!({ "description": "kept" })));
    }

    #[test]
    fn test_map_never_sees_null() {
        let event = IncomingEvent::new("metadata", json!({ "len": 3, "created": null }));
        parse_with(event, &["metadata"], |data, _| {
            let data = data.unwrap();
            assert!(data.get("created").is_none());
            Ok(())
        })
        .unwrap();
    }
}

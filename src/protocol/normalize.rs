//! Absent-value normalization.
//!
//! The wire encodes "no value" as a sentinel (`null` in JSON, `nil` in
//! MsgPack). Mapping and routing code must never see it, so incoming
//! payloads are rewritten before classification: sentinel entries are removed
//! from mappings, sentinel elements are removed from sequences, and a
//! top-level sentinel becomes `None`.

use serde_json::Value;

use super::IncomingEvent;

/// Strip every sentinel from `value`, recursively.
///
/// Returns `None` when the value itself is the sentinel.
pub fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect(),
        )),
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(normalize).collect(),
        )),
        other => Some(other),
    }
}

/// Normalize the payload of an incoming event.
pub fn normalize_event(event: IncomingEvent) -> IncomingEvent {
    IncomingEvent {
        tag: event.tag,
        data: event.data.and_then(normalize),
    }
}

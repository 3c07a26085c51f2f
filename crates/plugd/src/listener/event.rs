// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound event envelopes.

use serde_json::{Map, Value};

use crate::error::DecodeError;

/// One event pushed by the hub.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackEvent {
    /// Dotted-namespace type, e.g. `message.incoming`.
    pub event_type: Option<String>,
    /// Present when the hub expects an acknowledgment.
    pub event_id: Option<String>,
    /// Every other top-level field of the envelope.
    pub payload: Map<String, Value>,
}

impl CallbackEvent {
    /// Decode a request body. Anything that is not a JSON object yields an
    /// empty event.
    pub fn decode(body: &[u8]) -> Self {
        match decode_envelope(body) {
            Ok(map) => Self::from_map(map),
            Err(e) => {
                tracing::debug!(err = %e, len = body.len(), "undecodable event body, using empty payload");
                Self::default()
            }
        }
    }

    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let event_type = match map.remove("event_type") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let event_id = match map.remove("event_id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self { event_type, event_id, payload: map }
    }

    /// Segment of the event type before the first `.`. `None` for a type
    /// without a dot.
    pub fn namespace(&self) -> Option<&str> {
        self.event_type.as_deref().and_then(namespace_of)
    }

    /// Segment after the namespace (`created` in `room.created`).
    pub fn action(&self) -> Option<&str> {
        self.event_type.as_deref().and_then(|t| t.split_once('.')).map(|(_, rest)| rest)
    }
}

/// `room` for `room.created`; `None` when there is no `<ns>.` prefix.
pub fn namespace_of(event_type: &str) -> Option<&str> {
    event_type.split_once('.').map(|(ns, _)| ns)
}

/// Parse a body into a JSON object. An empty (or whitespace) body is an
/// empty object.
pub fn decode_envelope(body: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(DecodeError::NotAnObject("array")),
        Value::String(_) => Err(DecodeError::NotAnObject("string")),
        Value::Number(_) => Err(DecodeError::NotAnObject("number")),
        Value::Bool(_) => Err(DecodeError::NotAnObject("bool")),
        Value::Null => Err(DecodeError::NotAnObject("null")),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

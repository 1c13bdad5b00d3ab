//! Encoding and decoding of [`StructuredMessage`] payloads

use super::messages::{KNOWN_TYPES, StructuredMessage};
use crate::schema::InboxMessage;
use serde_json::Value;
use tracing::trace;

/// Decode the structured payload of an inbox entry.
///
/// Never fails: anything that is not a well-formed message of a known type
/// comes back as [`StructuredMessage::PlainText`] carrying the entry's text
/// unchanged.
pub fn decode(envelope: &InboxMessage) -> StructuredMessage {
    decode_text(&envelope.text)
}

/// Decode raw inbox text. See [`decode`].
pub fn decode_text(text: &str) -> StructuredMessage {
    let plain = || StructuredMessage::PlainText {
        text: text.to_string(),
    };

    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return plain();
    };
    let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_owned) else {
        return plain();
    };
    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return plain();
    }

    match serde_json::from_value(value) {
        Ok(message) => message,
        Err(e) => {
            trace!("Malformed {kind} payload treated as plain text: {e}");
            plain()
        }
    }
}

/// Encode a message as inbox text.
///
/// Structured variants become a JSON object with a `type` discriminant;
/// [`StructuredMessage::PlainText`] is returned verbatim.
pub fn encode(message: &StructuredMessage) -> String {
    if let StructuredMessage::PlainText { text } = message {
        return text.clone();
    }
    // Structured variants only hold strings, bools and JSON values.
    serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
}

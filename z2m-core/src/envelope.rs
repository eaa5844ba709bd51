//! Message normalization.
//!
//! The gateway publishes three payload shapes on the same topics: JSON
//! objects, JSON scalars/arrays, and plain non-JSON text (e.g. the bare
//! `online` state string). Everything downstream of the transport consumes
//! one canonical [`MessageEnvelope`], produced here.

use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Reserved key non-object payloads are wrapped under.
pub const MESSAGE_KEY: &str = "message";

/// Canonical structured form of a message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEnvelope {
    /// A JSON object; it is the envelope as-is.
    Object(Map<String, Value>),
    /// A single scalar value (string/number/bool), exposed under
    /// [`MESSAGE_KEY`].
    Scalar(Value),
    /// A list of values, exposed under [`MESSAGE_KEY`].
    List(Vec<Value>),
}

impl MessageEnvelope {
    /// Normalize a raw payload into an envelope.
    ///
    /// Bytes are decoded as UTF-8 (lossily) and parsed as JSON. Plain text
    /// that fails the strict parse is escaped deterministically (internal
    /// quotes backslash-escaped, CRLF and tab collapsed to a single space),
    /// quoted and reparsed, so a bare status string like `online` becomes a
    /// string scalar rather than an error. Only a doubly-malformed input
    /// yields [`BridgeError::Envelope`]; callers log and drop it, never
    /// propagate it to the connection.
    pub fn normalize(topic: &str, payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);

        let value = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) => {
                let escaped = escape_plain_text(&text);
                serde_json::from_str::<Value>(&escaped)
                    .map_err(|e| BridgeError::envelope(topic, e.to_string()))?
            }
        };

        Ok(Self::from_value(value))
    }

    /// Build an envelope from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::List(items),
            scalar => Self::Scalar(scalar),
        }
    }

    /// Look up a field of the envelope.
    ///
    /// For an object this is a plain map lookup; a scalar is visible only
    /// under [`MESSAGE_KEY`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            Self::Scalar(value) if key == MESSAGE_KEY => Some(value),
            _ => None,
        }
    }

    /// The message field as a string, if it is one.
    pub fn message_str(&self) -> Option<&str> {
        match self {
            Self::Object(map) => map.get(MESSAGE_KEY).and_then(Value::as_str),
            Self::Scalar(value) => value.as_str(),
            Self::List(_) => None,
        }
    }

    /// The message field as a list, if it is one.
    pub fn message_list(&self) -> Option<&[Value]> {
        match self {
            Self::Object(map) => map.get(MESSAGE_KEY).and_then(Value::as_array).map(Vec::as_slice),
            Self::List(items) => Some(items),
            Self::Scalar(_) => None,
        }
    }

    /// The wrapped canonical object form.
    ///
    /// Objects pass through unchanged; scalars and lists are wrapped under
    /// [`MESSAGE_KEY`]. Normalizing the serialized result yields the same
    /// object again.
    pub fn to_object(&self) -> Map<String, Value> {
        match self {
            Self::Object(map) => map.clone(),
            Self::Scalar(value) => wrap(value.clone()),
            Self::List(items) => wrap(Value::Array(items.clone())),
        }
    }
}

fn wrap(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(MESSAGE_KEY.to_string(), value);
    map
}

/// Escape plain text so it parses as a JSON string literal.
fn escape_plain_text(text: &str) -> String {
    let escaped = text
        .replace('"', "\\\"")
        .replace("\r\n", " ")
        .replace('\t', " ");
    format!("\"{}\"", escaped)
}

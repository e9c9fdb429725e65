//! Routable message values and frame ingestion.

use serde_json::{Map, Value};

/// Message name used for every binary frame.
pub const BINARY_MESSAGE_NAME: &str = "binary";

/// Field of a JSON envelope holding the message name.
pub const MESSAGE_TYPE_FIELD: &str = "type";

/// Payload handed to middleware and processors.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Parsed JSON object from a text frame.
    Json(Map<String, Value>),
    /// Raw payload of a binary frame.
    Binary(Vec<u8>),
}

impl Message {
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Message::Json(obj) => Some(obj),
            Message::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Message::Json(_) => None,
            Message::Binary(data) => Some(data),
        }
    }

    /// Field of a JSON message, `None` for binary payloads.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(name))
    }
}

/// Why a text frame could not be turned into a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    InvalidJson,
    NotAnObject,
}

impl IngestError {
    pub fn code(&self) -> u16 {
        400
    }

    pub fn message(&self) -> &'static str {
        match self {
            IngestError::InvalidJson => "Invalid json",
            IngestError::NotAnObject => "Expected json object payload",
        }
    }
}

/// Parse a text frame into `(name, message)`.
///
/// A missing or non-string `type` field yields an empty name.
pub fn parse_text(text: &str) -> Result<(String, Message), IngestError> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "JSON error");
            return Err(IngestError::InvalidJson);
        }
    };
    let Value::Object(obj) = value else {
        return Err(IngestError::NotAnObject);
    };
    let name = obj
        .get(MESSAGE_TYPE_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok((name, Message::Json(obj)))
}

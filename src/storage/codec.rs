//! Boundary codec: value → JSON text → value
//!
//! Every backend converts values to JSON text right before handing them to its
//! primitive (IPC host, local storage area, document store) and back right
//! after reading. Encoding failures are write errors carrying the key;
//! decoding failures on the read path are logged and reported as absent.

use crate::error::{StorageError, StorageResult};
use crate::storage::storage_api::StoreValues;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Encode `value` as JSON text for storage under `key`
pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::WriteFailed {
        key: key.to_string(),
        reason: format!("serialization failed: {}", e),
    })
}

/// Convert a typed value into a [`Value`] for storage under `key`
pub fn to_value<T: Serialize + ?Sized>(key: &str, value: &T) -> StorageResult<Value> {
    serde_json::to_value(value).map_err(|e| StorageError::WriteFailed {
        key: key.to_string(),
        reason: format!("serialization failed: {}", e),
    })
}

/// Decode JSON text stored under `key`.
///
/// Empty or malformed text yields `None`. Malformed text is logged; this hides
/// real corruption from callers, use [`decode_strict`] where that matters.
pub fn decode(key: &str, text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "failed to parse stored value");
            None
        }
    }
}

/// Decode JSON text stored under `key`, surfacing malformed text as an error
pub fn decode_strict(key: &str, text: &str) -> StorageResult<Value> {
    serde_json::from_str(text).map_err(|e| StorageError::OperationFailed {
        operation: "decode".to_string(),
        reason: format!("stored value for key \"{}\" is not valid JSON: {}", key, e),
    })
}

/// Encode a whole mapping as one JSON envelope
pub fn encode_envelope(values: &StoreValues) -> StorageResult<String> {
    serde_json::to_string(values).map_err(|e| StorageError::WriteFailed {
        key: "*".to_string(),
        reason: format!("serialization failed: {}", e),
    })
}

/// Decode a JSON envelope back into a mapping; anything but an object reads as empty
pub fn decode_envelope(text: &str) -> StoreValues {
    match decode("*", text) {
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!(kind = json_kind(&other), "envelope is not a JSON object");
            StoreValues::new()
        }
        None => StoreValues::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

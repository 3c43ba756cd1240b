//! Centralized JSON encoding and decoding of wire messages.
//!
//! Every message crosses the wire as JSON text; this module is the one place where
//! serde_json errors are mapped into [`GridroomError::Serialization`], so boundary
//! failures carry context instead of panicking a room or a client.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::GridroomError;

/// Encodes a message to its JSON wire text.
///
/// # Errors
///
/// Returns [`GridroomError::Serialization`] if the value cannot be represented as JSON.
pub fn encode<T: Serialize>(value: &T) -> Result<String, GridroomError> {
    serde_json::to_string(value).map_err(|err| GridroomError::Serialization {
        context: format!("encode failed: {err}"),
    })
}

/// Decodes a message from its JSON wire text.
///
/// # Errors
///
/// Returns [`GridroomError::Serialization`] for malformed or unexpected message shapes.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, GridroomError> {
    serde_json::from_str(text).map_err(|err| GridroomError::Serialization {
        context: format!("decode failed: {err}"),
    })
}

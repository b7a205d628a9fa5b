// src/utils/serialization.rs
//! Serialization utilities for compact credential tokens.
//!
//! Provides serialization and deserialization functions for:
//! - JSON data structures
//! - URL-safe, unpadded base64 segments used by compact JWS tokens

use serde::{Deserialize, Serialize};
use serde_json;

/// Serializes a value to a JSON string.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
///
/// # Returns
/// - `Ok(String)` with JSON representation on success
/// - `Err(serde_json::Error)` if serialization fails
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(data)
}

/// Deserializes a value from a JSON string.
///
/// # Arguments
/// * `data` - JSON string to deserialize
///
/// # Returns
/// - `Ok(T)` with deserialized value on success
/// - `Err(serde_json::Error)` if deserialization fails
pub fn deserialize<'a, T: Deserialize<'a>>(data: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

/// Encodes bytes as a base64url segment without padding.
pub fn encode_segment(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Serializes a value to JSON and encodes it as a base64url segment.
pub fn encode_json_segment<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    Ok(encode_segment(serialize(data)?.as_bytes()))
}

/// Decodes a base64url segment, padded or not.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, String> {
    base64::decode_config(segment.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
        .map_err(|e| format!("Base64 decoding failed: {}", e))
}

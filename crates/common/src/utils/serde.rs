//! Serialization utilities for common data types
//!
//! Reusable `#[serde(with = ...)]` modules for the cache storage format.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize raw bytes as standard base64 text
///
/// Keeps binary response payloads JSON-safe when cache entries are persisted.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

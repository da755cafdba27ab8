//! Versioned envelope for cache entry payloads.
//!
//! Every value stored in the cache backend goes through the same envelope:
//!
//! ```text
//! [MAGIC: 4 bytes] [VERSION: 4 bytes LE] [POSTCARD PAYLOAD]
//! ```
//!
//! The magic header rejects foreign or corrupted entries early; the version
//! lets a deploy with a changed record schema treat every old entry as
//! invalid instead of misreading it.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

const MAGIC: &[u8; 4] = b"LMQC";
const SCHEMA_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

/// Serialize a cache entry into an enveloped byte buffer.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(value).map_err(|e| Error::Serialization(e.to_string()))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Deserialize a cache entry, validating magic and schema version first.
///
/// # Errors
///
/// - [`Error::InvalidCacheEntry`]: bad magic or truncated envelope
/// - [`Error::VersionMismatch`]: entry written under another schema version
/// - [`Error::Deserialization`]: corrupted payload
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(Error::InvalidCacheEntry);
    }
    let found = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if found != SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        });
    }
    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| Error::Deserialization(e.to_string()))
}

//! Wire codec for all network records.
//!
//! Every message that crosses a node boundary is a length-delimited bincode
//! record. Decoding is capped implicitly by the network layer's frame size;
//! this module only concerns itself with the byte <-> struct mapping.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Wire encoding/decoding errors.
#[derive(Debug, Error)]
pub enum WireError {
    /// Record could not be serialized.
    #[error("Wire encode failed: {0}")]
    Encode(String),

    /// Bytes could not be parsed back into the record.
    #[error("Wire decode failed: {0}")]
    Decode(String),
}

/// Encode a record into its wire bytes.
pub fn to_wire_bytes<T: Serialize>(record: &T) -> Result<Vec<u8>, WireError> {
    bincode::serialize(record).map_err(|e| WireError::Encode(e.to_string()))
}

/// Decode a record from wire bytes.
pub fn from_wire_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

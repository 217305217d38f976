//! Identifier type
//!
//! Ids are supplied by the caller, never generated by the store. They are
//! byte strings so that both textual keys and binary keys (hashes, packed
//! UUIDs) can be stored; textual ids are simply their UTF-8 bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller supplied document identifier
///
/// # Examples
///
/// ```
/// use docstore_core::DocId;
///
/// let text = DocId::from("user-1");
/// assert_eq!(text.as_str(), Some("user-1"));
///
/// let binary = DocId::from_hex("00ff").unwrap();
/// assert_eq!(binary.as_bytes(), &[0x00, 0xff]);
/// assert_eq!(binary.to_hex(), "00ff");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(Vec<u8>);

impl DocId {
    /// Create from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        DocId(bytes.into())
    }

    /// Decode a hex string (either case); `None` if it is not valid hex
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        hex::decode(hex_str).ok().map(DocId)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The id as text, if the bytes are valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Consume into raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "0x{}", self.to_hex()),
        }
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId(s.as_bytes().to_vec())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        DocId(s.into_bytes())
    }
}

impl From<&String> for DocId {
    fn from(s: &String) -> Self {
        DocId::from(s.as_str())
    }
}

impl From<Vec<u8>> for DocId {
    fn from(bytes: Vec<u8>) -> Self {
        DocId(bytes)
    }
}

impl From<&[u8]> for DocId {
    fn from(bytes: &[u8]) -> Self {
        DocId(bytes.to_vec())
    }
}

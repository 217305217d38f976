//! Error types for the document store
//!
//! Every failure the engine surfaces is one of these variants. Backend
//! failures are wrapped into [`Error::Storage`] at the engine boundary; the
//! business outcomes of the save protocol get their own variants so callers
//! can match on them. We use `thiserror` for `Display` and `Error`.

use thiserror::Error;

/// Result type alias for document store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document store
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying storage failure (connection loss, bad statement, missing
    /// table, oversized body)
    #[error("Storage error: {message}")]
    Storage {
        /// Backend or engine supplied description
        message: String,
    },

    /// The document does not have the shape this store requires
    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    /// Conversion between a document and its JSON tree failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A create collided with an existing id
    #[error("Item already exists: {id}")]
    ItemAlreadyExists {
        /// Display form of the colliding id
        id: String,
    },

    /// A conditional update did not find the expected revision
    #[error("{}", unexpected_revision_message(.id, *.expected, *.actual))]
    UnexpectedRevision {
        /// Display form of the id
        id: String,
        /// Revision the caller expected
        expected: u64,
        /// Revision found, `None` if the item does not exist
        actual: Option<u64>,
    },

    /// A secondary unique column rejected the write
    #[error("Unique constraint violation on {key}: {value}")]
    UniqueConstraintViolation {
        /// Violated key (column) name
        key: String,
        /// Offending value
        value: String,
    },

    /// Store configuration rejected at build time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn unexpected_revision_message(id: &str, expected: u64, actual: Option<u64>) -> String {
    match actual {
        Some(actual) => format!(
            "Unexpected revision for {}: expected {}, actual {}",
            id, expected, actual
        ),
        None => format!(
            "Unexpected revision for {}: expected {}, item not found",
            id, expected
        ),
    }
}

impl Error {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Storage error for a serialized body over the configured maximum
    pub fn document_too_large(size: usize, max: usize) -> Self {
        Error::storage(format!(
            "serialized document size {} exceeds maximum of {} bytes",
            size, max
        ))
    }

    /// True for [`Error::Storage`]
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage { .. })
    }

    /// True for the optimistic concurrency and uniqueness outcomes
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::ItemAlreadyExists { .. }
                | Error::UnexpectedRevision { .. }
                | Error::UniqueConstraintViolation { .. }
        )
    }

    /// True for the not-found flavour of [`Error::UnexpectedRevision`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::UnexpectedRevision { actual: None, .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

//! Error types for synapse.
//!
//! The variants follow the error taxonomy of the persistence layer:
//!
//! | Kind | Variants | Handling |
//! |------|----------|----------|
//! | Transient persistence failure | `Storage`, `StorageUnavailable`, `Request` | rollback or retry on next edit |
//! | Version conflict | `Conflict` | surfaced to the caller |
//! | Authentication failure | `Unauthorized` | one refresh, then session cleared |
//! | Missing/invalid input | `InvalidInput`, `Duplicate` | rejected before any network call |

use thiserror::Error;

/// Result type alias using synapse's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for synapse operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A KeyedStore write or read failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The storage medium cannot accept writes right now.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stale version or concurrent promotion rejected by the remote side
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Item already present in a collection
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Authentication/authorization failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is a transient persistence failure that is
    /// recovered locally (rollback or retry on the next edit).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::StorageUnavailable(_) | Error::Request(_) | Error::Io(_)
        )
    }

    /// Whether the remote side rejected the request as conflicting.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

//! Storage errors.

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised by a `LedgerStore` implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// A row addressed by an update or delete does not exist.
    #[error("row not found: {0}")]
    NotFound(String),

    /// Any other backend failure (connection, commit, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the taxonomy kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Backend(_) => ErrorKind::StorageFailure,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "STORE_CONFLICT",
            Self::NotFound(_) => "STORE_NOT_FOUND",
            Self::Backend(_) => "STORAGE_FAILURE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Returns true for unique-constraint violations.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

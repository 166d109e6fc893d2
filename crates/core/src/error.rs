//! Error taxonomy shared by every core module.

use serde::Serialize;

/// Coarse classification of a failure, independent of the module that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Referenced entity does not exist.
    NotFound,
    /// Action attempted outside the allowed state.
    InvalidState,
    /// Balance check failed.
    InsufficientFunds,
    /// Actor may not perform the action.
    PermissionDenied,
    /// Uniqueness violation or exhausted retries.
    Conflict,
    /// Malformed input.
    Validation,
    /// Transaction or commit failure.
    StorageFailure,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn http_status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidState | Self::Conflict => 409,
            Self::InsufficientFunds => 422,
            Self::PermissionDenied => 403,
            Self::Validation => 400,
            Self::StorageFailure => 500,
        }
    }
}

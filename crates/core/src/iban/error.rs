//! Account number errors.

use thiserror::Error;

/// Errors raised while building or parsing account numbers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IbanError {
    /// Wrong number of characters.
    #[error("expected {expected} characters, got {actual}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// A character outside the allowed alphabet.
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    /// Check digits do not match the body.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Country prefix is not supported.
    #[error("unsupported country code {0}")]
    UnsupportedCountry(String),

    /// No valid candidate was produced within the attempt bound.
    #[error("no valid account number after {0} candidates")]
    Exhausted(u32),
}

impl IbanError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidLength { .. } => "IBAN_INVALID_LENGTH",
            Self::InvalidCharacter(_) => "IBAN_INVALID_CHARACTER",
            Self::ChecksumMismatch => "IBAN_CHECKSUM_MISMATCH",
            Self::UnsupportedCountry(_) => "IBAN_UNSUPPORTED_COUNTRY",
            Self::Exhausted(_) => "IBAN_EXHAUSTED",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Exhausted(_) => 500,
            _ => 400,
        }
    }
}

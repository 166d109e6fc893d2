//! Error type for ledger and collection operations.
//!
//! Every variant belongs to one `ErrorKind`; the HTTP layer only looks at the
//! kind and the stable code.

use rust_decimal::Decimal;
use schoolmoney_shared::AppError;
use schoolmoney_shared::types::{
    AmountError, BankAccountId, ChildId, ClassGroupId, CollectionId, ParentId, UserId,
};
use thiserror::Error;

use crate::collection::types::{CollectionStatus, ParticipationStatus};
use crate::error::ErrorKind;
use crate::iban::IbanError;
use crate::store::StoreError;

/// Errors that can occur during ledger and collection operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Not Found ==========
    /// Bank account not found.
    #[error("Bank account not found: {0}")]
    AccountNotFound(BankAccountId),

    /// No account carries this number.
    #[error("No bank account with number {0}")]
    AccountNumberNotFound(String),

    /// Collection not found.
    #[error("Collection not found: {0}")]
    CollectionNotFound(CollectionId),

    /// Child not found.
    #[error("Child not found: {0}")]
    ChildNotFound(ChildId),

    /// Class group not found.
    #[error("Class group not found: {0}")]
    ClassGroupNotFound(ClassGroupId),

    /// Parent profile not found.
    #[error("Parent not found: {0}")]
    ParentNotFound(ParentId),

    /// The user has no parent profile yet.
    #[error("User {0} has no parent profile")]
    ProfileNotFound(UserId),

    /// No participation row the action could apply to.
    #[error("No {expected} operation for child {child} in collection {collection}")]
    OperationNotFound {
        /// The child.
        child: ChildId,
        /// The collection.
        collection: CollectionId,
        /// Operation type that was looked for.
        expected: &'static str,
    },

    // ========== Invalid State ==========
    /// Collection status does not allow the action.
    #[error("Cannot {action} a collection in status {status}")]
    CollectionState {
        /// Current status.
        status: CollectionStatus,
        /// Attempted action.
        action: &'static str,
    },

    /// Child participation does not allow the action.
    #[error("Cannot {action} child {child}: participation is {status}")]
    ParticipationState {
        /// The child.
        child: ChildId,
        /// Effective participation.
        status: ParticipationStatus,
        /// Attempted action.
        action: &'static str,
    },

    /// Bank account is locked.
    #[error("Bank account {0} is locked")]
    AccountLocked(BankAccountId),

    // ========== Funds ==========
    /// Balance is lower than required.
    #[error("Insufficient funds on {account}: required {required}, available {available}")]
    InsufficientFunds {
        /// The debited account.
        account: BankAccountId,
        /// Amount the action needs.
        required: Decimal,
        /// Current balance.
        available: Decimal,
    },

    // ========== Permission ==========
    /// The actor may not perform the action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ========== Conflict ==========
    /// Duplicate entity.
    #[error("{0}")]
    Conflict(String),

    /// Every generated account number collided.
    #[error("Could not allocate a unique account number after {0} attempts")]
    AccountNumbersExhausted(u32),

    // ========== Validation ==========
    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// Amount is not positive or has too many fractional digits.
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Malformed account number.
    #[error("Invalid account number: {0}")]
    InvalidAccountNumber(#[from] IbanError),

    // ========== Storage ==========
    /// Storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns the taxonomy kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_)
            | Self::AccountNumberNotFound(_)
            | Self::CollectionNotFound(_)
            | Self::ChildNotFound(_)
            | Self::ClassGroupNotFound(_)
            | Self::ParentNotFound(_)
            | Self::ProfileNotFound(_)
            | Self::OperationNotFound { .. } => ErrorKind::NotFound,
            Self::CollectionState { .. }
            | Self::ParticipationState { .. }
            | Self::AccountLocked(_) => ErrorKind::InvalidState,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Conflict(_) | Self::AccountNumbersExhausted(_) => ErrorKind::Conflict,
            Self::Validation(_) | Self::InvalidAmount(_) => ErrorKind::Validation,
            Self::InvalidAccountNumber(IbanError::Exhausted(_)) => ErrorKind::StorageFailure,
            Self::InvalidAccountNumber(_) => ErrorKind::Validation,
            Self::Store(err) => err.kind(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountNumberNotFound(_) => "ACCOUNT_NUMBER_NOT_FOUND",
            Self::CollectionNotFound(_) => "COLLECTION_NOT_FOUND",
            Self::ChildNotFound(_) => "CHILD_NOT_FOUND",
            Self::ClassGroupNotFound(_) => "CLASS_GROUP_NOT_FOUND",
            Self::ParentNotFound(_) => "PARENT_NOT_FOUND",
            Self::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
            Self::OperationNotFound { .. } => "OPERATION_NOT_FOUND",
            Self::CollectionState { .. } => "INVALID_COLLECTION_STATE",
            Self::ParticipationState { .. } => "INVALID_PARTICIPATION_STATE",
            Self::AccountLocked(_) => "ACCOUNT_LOCKED",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::Conflict(_) => "CONFLICT",
            Self::AccountNumbersExhausted(_) => "ACCOUNT_NUMBERS_EXHAUSTED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidAccountNumber(err) => err.error_code(),
            Self::Store(err) => err.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Shorthand for a permission failure.
    pub(crate) fn denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(msg),
            ErrorKind::InvalidState => Self::InvalidState(msg),
            ErrorKind::InsufficientFunds => Self::InsufficientFunds(msg),
            ErrorKind::PermissionDenied => Self::PermissionDenied(msg),
            ErrorKind::Conflict => Self::Conflict(msg),
            ErrorKind::Validation => Self::Validation(msg),
            ErrorKind::StorageFailure => Self::StorageFailure(msg),
        }
    }
}

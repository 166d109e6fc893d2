//! Ledger domain types.
//!
//! Accounts never store a balance; it is always derived from the operation
//! log (see `balance`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use schoolmoney_shared::types::{Amount, BankAccountId, BankOperationId};

use crate::iban::AccountNumber;

/// A virtual bank account owned by exactly one parent or one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Account ID.
    pub id: BankAccountId,
    /// Unique 26-digit account number.
    pub account_number: AccountNumber,
    /// Lock flag set by administrators.
    pub is_locked: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Direction of an operation relative to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Money entering from outside (no source account).
    Deposit,
    /// Money leaving to the outside (no destination account).
    Withdrawal,
    /// Money moving between two internal accounts.
    Transfer,
}

/// An immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankOperation {
    /// Sequence id.
    pub id: BankOperationId,
    /// When the operation was booked.
    pub operation_date: DateTime<Utc>,
    /// Positive amount with two fractional digits.
    pub amount: Decimal,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Debited account, `None` for external deposits.
    pub source_account_id: Option<BankAccountId>,
    /// Credited account, `None` for external withdrawals.
    pub destination_account_id: Option<BankAccountId>,
}

impl BankOperation {
    /// Classifies the operation by which sides are internal.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match (self.source_account_id, self.destination_account_id) {
            (None, _) => OperationKind::Deposit,
            (Some(_), None) => OperationKind::Withdrawal,
            (Some(_), Some(_)) => OperationKind::Transfer,
        }
    }

    /// Signed effect of this operation on `account`.
    #[must_use]
    pub fn effect_on(&self, account: BankAccountId) -> Decimal {
        let mut delta = Decimal::ZERO;
        if self.destination_account_id == Some(account) {
            delta += self.amount;
        }
        if self.source_account_id == Some(account) {
            delta -= self.amount;
        }
        delta
    }
}

/// Input for a new ledger row. Validated by `LedgerService::validate_operation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBankOperation {
    /// Debited account.
    pub source_account_id: Option<BankAccountId>,
    /// Credited account.
    pub destination_account_id: Option<BankAccountId>,
    /// Amount to move.
    pub amount: Amount,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
}

/// An account with its derived balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: BankAccountId,
    /// Derived balance.
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn op(source: Option<BankAccountId>, destination: Option<BankAccountId>) -> BankOperation {
        BankOperation {
            id: BankOperationId(1),
            operation_date: Utc::now(),
            amount: dec!(12.50),
            title: "t".into(),
            description: None,
            source_account_id: source,
            destination_account_id: destination,
        }
    }

    #[test]
    fn test_kind_and_effect() {
        let a = BankAccountId::new();
        let b = BankAccountId::new();

        let deposit = op(None, Some(a));
        assert_eq!(deposit.kind(), OperationKind::Deposit);
        assert_eq!(deposit.effect_on(a), dec!(12.50));
        assert_eq!(deposit.effect_on(b), Decimal::ZERO);

        let transfer = op(Some(a), Some(b));
        assert_eq!(transfer.kind(), OperationKind::Transfer);
        assert_eq!(transfer.effect_on(a), dec!(-12.50));
        assert_eq!(transfer.effect_on(b), dec!(12.50));

        assert_eq!(op(Some(b), None).kind(), OperationKind::Withdrawal);
    }
}

//! Report data types.

use rust_decimal::Decimal;
use serde::Serialize;
use schoolmoney_shared::types::{Amount, BankAccountId, ClassGroupId, CollectionId};

use crate::access::Child;
use crate::collection::{CollectionStatus, ParticipationStatus};

/// A child with its effective participation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildParticipation {
    /// The child.
    #[serde(flatten)]
    pub child: Child,
    /// Effective participation.
    pub status: ParticipationStatus,
}

/// Children of a collection's class split by participation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChildrenFinancialStatus {
    /// Effective row is a payment.
    pub paid: Vec<ChildParticipation>,
    /// No rows yet.
    pub unpaid: Vec<ChildParticipation>,
    /// Discharged or refunded.
    pub excluded: Vec<ChildParticipation>,
}

/// Money summary of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFinancialReport {
    /// Collection ID.
    pub collection_id: CollectionId,
    /// Collection name.
    pub name: String,
    /// Current status.
    pub status: CollectionStatus,
    /// Collection account.
    pub bank_account_id: BankAccountId,
    /// Price per child.
    pub price: Amount,
    /// Children in the class.
    pub total_children: usize,
    /// Children whose share is paid.
    pub paid_count: usize,
    /// Participating children that have not paid.
    pub unpaid_count: usize,
    /// Discharged or refunded children.
    pub excluded_count: usize,
    /// `price × (paid + unpaid)`.
    pub expected: Decimal,
    /// `price × paid`.
    pub collected: Decimal,
    /// `expected − collected`.
    pub outstanding: Decimal,
    /// Total withdrawn by the owner.
    pub withdrawn: Decimal,
    /// `max(0, collected − withdrawn)`.
    pub available: Decimal,
    /// Balance derived from the collection account's ledger.
    pub ledger_balance: Decimal,
}

/// Sums over the collections of a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    /// Sum of `expected`.
    pub expected: Decimal,
    /// Sum of `collected`.
    pub collected: Decimal,
    /// Sum of `outstanding`.
    pub outstanding: Decimal,
    /// Sum of `withdrawn`.
    pub withdrawn: Decimal,
    /// Sum of `available`.
    pub available: Decimal,
    /// Sum of `ledger_balance`.
    pub ledger_balance: Decimal,
}

/// All collections of one class group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFinancialReport {
    /// Class group ID.
    pub class_group_id: ClassGroupId,
    /// Per-collection summaries, oldest first.
    pub collections: Vec<CollectionFinancialReport>,
    /// Totals across `collections`.
    pub totals: ReportTotals,
}

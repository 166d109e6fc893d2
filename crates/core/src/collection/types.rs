//! Collection domain types and the effective-participation rule.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use schoolmoney_shared::types::{
    Amount, BankAccountId, BankOperationId, ChildId, ClassGroupId, CollectionId,
    CollectionOperationId, ParentId,
};

/// Lifecycle status of a collection.
///
/// Valid transitions:
/// - Open → Blocked | Cancelled | Finished | NotPaidBeforeDeadline
/// - Blocked → Open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    /// Accepting payments.
    Open,
    /// Cancelled, every payment refunded.
    Cancelled,
    /// Frozen by an administrator.
    Blocked,
    /// Closed successfully.
    Finished,
    /// Closed with unpaid children.
    NotPaidBeforeDeadline,
}

impl CollectionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Cancelled => "CANCELLED",
            Self::Blocked => "BLOCKED",
            Self::Finished => "FINISHED",
            Self::NotPaidBeforeDeadline => "NOT_PAID_BEFORE_DEADLINE",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "CANCELLED" => Some(Self::Cancelled),
            "BLOCKED" => Some(Self::Blocked),
            "FINISHED" => Some(Self::Finished),
            "NOT_PAID_BEFORE_DEADLINE" => Some(Self::NotPaidBeforeDeadline),
            _ => None,
        }
    }

    /// Returns true if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Finished | Self::NotPaidBeforeDeadline
        )
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a participation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionOperationType {
    /// The child's share was paid.
    Pay,
    /// The child was opted out.
    Discharge,
    /// A payment was returned.
    Refund,
}

impl CollectionOperationType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pay => "PAY",
            Self::Discharge => "DISCHARGE",
            Self::Refund => "REFUND",
        }
    }
}

impl fmt::Display for CollectionOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child's effective participation, derived from its latest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    /// No rows yet: expected to pay.
    Unpaid,
    /// Latest row is a PAY.
    Paid,
    /// Latest row is a DISCHARGE.
    Discharged,
    /// Latest row is a REFUND.
    Refunded,
}

impl ParticipationStatus {
    /// Maps the latest row type (if any) to a status.
    #[must_use]
    pub const fn from_latest(latest: Option<CollectionOperationType>) -> Self {
        match latest {
            None => Self::Unpaid,
            Some(CollectionOperationType::Pay) => Self::Paid,
            Some(CollectionOperationType::Discharge) => Self::Discharged,
            Some(CollectionOperationType::Refund) => Self::Refunded,
        }
    }

    /// Counted in the expected total (not discharged and not refunded).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Unpaid | Self::Paid)
    }

    /// Excluded from the collection.
    #[must_use]
    pub const fn is_excluded(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Discharged => "discharged",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// A fundraiser tied to a class group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection ID.
    pub id: CollectionId,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Start of the collection.
    pub start_date: DateTime<Utc>,
    /// Optional deadline.
    pub end_date: Option<DateTime<Utc>>,
    /// Price per participating child.
    pub price: Amount,
    /// Lifecycle status.
    pub status: CollectionStatus,
    /// Owning class group.
    pub class_group_id: ClassGroupId,
    /// Backing bank account.
    pub bank_account_id: BankAccountId,
    /// Parent who created the collection.
    pub owner_id: ParentId,
    /// Total withdrawn so far. Never decreases.
    pub withdrawn_money: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// A participation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOperation {
    /// Sequence id.
    pub id: CollectionOperationId,
    /// The child.
    pub child_id: ChildId,
    /// The collection.
    pub collection_id: CollectionId,
    /// Row type.
    pub operation_type: CollectionOperationType,
    /// Parent who acted.
    pub requester_id: ParentId,
    /// When the row was written.
    pub operation_date: DateTime<Utc>,
    /// Ledger row that moved money for this action.
    pub payment_id: Option<BankOperationId>,
}

/// Input for a new participation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollectionOperation {
    /// The child.
    pub child_id: ChildId,
    /// The collection.
    pub collection_id: CollectionId,
    /// Row type.
    pub operation_type: CollectionOperationType,
    /// Parent who acted.
    pub requester_id: ParentId,
    /// Row timestamp.
    pub operation_date: DateTime<Utc>,
    /// Ledger row that moved money.
    pub payment_id: Option<BankOperationId>,
}

/// Fields for a new collection.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollection {
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Start of the collection, defaults to now.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Optional deadline.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Price per child.
    pub price: Decimal,
    /// Owning class group.
    pub class_group_id: ClassGroupId,
}

/// Editable collection fields. `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCollection {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New deadline.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// New price; rejected once any payment exists.
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// How an open collection is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishOutcome {
    /// Everything collected.
    Finished,
    /// Deadline passed with unpaid children.
    NotPaidBeforeDeadline,
}

impl FinishOutcome {
    /// Target status.
    #[must_use]
    pub const fn status(self) -> CollectionStatus {
        match self {
            Self::Finished => CollectionStatus::Finished,
            Self::NotPaidBeforeDeadline => CollectionStatus::NotPaidBeforeDeadline,
        }
    }
}

/// Returns the effective row for one child: max `operation_date`, ties broken
/// by the highest id.
#[must_use]
pub fn latest_operation<'a, I>(rows: I) -> Option<&'a CollectionOperation>
where
    I: IntoIterator<Item = &'a CollectionOperation>,
{
    rows.into_iter()
        .max_by_key(|row| (row.operation_date, row.id))
}

/// Effective row per child for a collection's full log.
#[must_use]
pub fn latest_per_child(rows: &[CollectionOperation]) -> HashMap<ChildId, &CollectionOperation> {
    let mut latest: HashMap<ChildId, &CollectionOperation> = HashMap::new();
    for row in rows {
        latest
            .entry(row.child_id)
            .and_modify(|current| {
                if (row.operation_date, row.id) > (current.operation_date, current.id) {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    latest
}

/// Effective participation of one child.
#[must_use]
pub fn participation_of(rows: &[CollectionOperation], child: ChildId) -> ParticipationStatus {
    let latest = latest_operation(rows.iter().filter(|row| row.child_id == child));
    ParticipationStatus::from_latest(latest.map(|row| row.operation_type))
}

/// The parent whose payment a refund returns: the requester of the child's
/// effective row, provided that row is a PAY.
#[must_use]
pub fn refund_recipient(rows: &[CollectionOperation], child: ChildId) -> Option<ParentId> {
    latest_operation(rows.iter().filter(|row| row.child_id == child))
        .filter(|row| row.operation_type == CollectionOperationType::Pay)
        .map(|row| row.requester_id)
}

/// Timestamp for a new row so it never sorts before the child's latest row.
#[must_use]
pub fn next_operation_date(
    rows: &[CollectionOperation],
    child: ChildId,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    latest_operation(rows.iter().filter(|row| row.child_id == child))
        .map_or(now, |row| row.operation_date.max(now))
}

//! Collection state machine and participation rules.
//!
//! Pure functions: they decide whether an action is allowed and what the new
//! status is. The engine applies the result inside a transaction.

use schoolmoney_shared::types::{ChildId, CollectionId};

use super::types::{CollectionStatus, FinishOutcome, ParticipationStatus};
use crate::ledger::LedgerError;

/// Stateless transition rules.
pub struct CollectionStateMachine;

impl CollectionStateMachine {
    /// Returns true if `from → to` is a valid transition.
    #[must_use]
    pub const fn can_transition(from: CollectionStatus, to: CollectionStatus) -> bool {
        matches!(
            (from, to),
            (
                CollectionStatus::Open,
                CollectionStatus::Blocked
                    | CollectionStatus::Cancelled
                    | CollectionStatus::Finished
                    | CollectionStatus::NotPaidBeforeDeadline
            ) | (CollectionStatus::Blocked, CollectionStatus::Open)
        )
    }

    /// Validates a transition and returns the target status.
    pub fn transition(
        from: CollectionStatus,
        to: CollectionStatus,
        action: &'static str,
    ) -> Result<CollectionStatus, LedgerError> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(LedgerError::CollectionState {
                status: from,
                action,
            })
        }
    }

    /// Fails unless the collection is open.
    pub fn require_open(status: CollectionStatus, action: &'static str) -> Result<(), LedgerError> {
        if status == CollectionStatus::Open {
            Ok(())
        } else {
            Err(LedgerError::CollectionState { status, action })
        }
    }

    /// Open → Blocked.
    pub fn block(status: CollectionStatus) -> Result<CollectionStatus, LedgerError> {
        Self::transition(status, CollectionStatus::Blocked, "block")
    }

    /// Blocked → Open.
    pub fn unblock(status: CollectionStatus) -> Result<CollectionStatus, LedgerError> {
        Self::transition(status, CollectionStatus::Open, "unblock")
    }

    /// Open → Cancelled.
    pub fn cancel(status: CollectionStatus) -> Result<CollectionStatus, LedgerError> {
        Self::transition(status, CollectionStatus::Cancelled, "cancel")
    }

    /// Open → Finished | NotPaidBeforeDeadline.
    pub fn finish(
        status: CollectionStatus,
        outcome: FinishOutcome,
    ) -> Result<CollectionStatus, LedgerError> {
        Self::transition(status, outcome.status(), "finish")
    }

    /// Withdrawals are refused only while blocked.
    pub fn check_withdraw(status: CollectionStatus) -> Result<(), LedgerError> {
        if status == CollectionStatus::Blocked {
            Err(LedgerError::CollectionState {
                status,
                action: "withdraw from",
            })
        } else {
            Ok(())
        }
    }

    /// A child may pay unless already paid or discharged.
    pub fn check_pay(child: ChildId, current: ParticipationStatus) -> Result<(), LedgerError> {
        match current {
            ParticipationStatus::Unpaid | ParticipationStatus::Refunded => Ok(()),
            ParticipationStatus::Paid | ParticipationStatus::Discharged => {
                Err(LedgerError::ParticipationState {
                    child,
                    status: current,
                    action: "pay for",
                })
            }
        }
    }

    /// Only a child with no rows can be discharged; paid children are refunded first.
    pub fn check_unsubscribe(
        child: ChildId,
        current: ParticipationStatus,
    ) -> Result<(), LedgerError> {
        if current == ParticipationStatus::Unpaid {
            Ok(())
        } else {
            Err(LedgerError::ParticipationState {
                child,
                status: current,
                action: "unsubscribe",
            })
        }
    }

    /// Restore needs a discharge as the effective row.
    pub fn check_restore(
        child: ChildId,
        collection: CollectionId,
        current: ParticipationStatus,
    ) -> Result<(), LedgerError> {
        if current == ParticipationStatus::Discharged {
            Ok(())
        } else {
            Err(LedgerError::OperationNotFound {
                child,
                collection,
                expected: "DISCHARGE",
            })
        }
    }

    /// Refund needs a payment as the effective row.
    pub fn check_refund(child: ChildId, current: ParticipationStatus) -> Result<(), LedgerError> {
        if current == ParticipationStatus::Paid {
            Ok(())
        } else {
            Err(LedgerError::ParticipationState {
                child,
                status: current,
                action: "refund",
            })
        }
    }
}

//! Conversions between entity models and core domain types.
//!
//! Rows that fail to convert (a corrupted account number, a non-positive
//! price) surface as `StoreError::Backend`; they can only come from writes
//! that bypassed the store.

use chrono::{DateTime, FixedOffset, Utc};
use schoolmoney_core::access::{Child, ClassGroup, Parent, ParentRole};
use schoolmoney_core::collection::{
    Collection, CollectionOperation, CollectionOperationType, CollectionStatus,
};
use schoolmoney_core::iban::AccountNumber;
use schoolmoney_core::ledger::{BankAccount, BankOperation};
use schoolmoney_core::store::{StoreError, StoreResult};
use schoolmoney_shared::types::{
    Amount, BankAccountId, BankOperationId, ChildId, ClassGroupId, CollectionId,
    CollectionOperationId, ParentId, UserId,
};

use crate::entities::{
    bank_accounts, bank_operations, children, class_groups, collection_operations, collections,
    parents, sea_orm_active_enums as db,
};

pub(crate) fn utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub(crate) fn fixed(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.fixed_offset()
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {what} row: {err}"))
}

impl From<CollectionStatus> for db::CollectionStatus {
    fn from(status: CollectionStatus) -> Self {
        match status {
            CollectionStatus::Open => Self::Open,
            CollectionStatus::Cancelled => Self::Cancelled,
            CollectionStatus::Blocked => Self::Blocked,
            CollectionStatus::Finished => Self::Finished,
            CollectionStatus::NotPaidBeforeDeadline => Self::NotPaidBeforeDeadline,
        }
    }
}

impl From<db::CollectionStatus> for CollectionStatus {
    fn from(status: db::CollectionStatus) -> Self {
        match status {
            db::CollectionStatus::Open => Self::Open,
            db::CollectionStatus::Cancelled => Self::Cancelled,
            db::CollectionStatus::Blocked => Self::Blocked,
            db::CollectionStatus::Finished => Self::Finished,
            db::CollectionStatus::NotPaidBeforeDeadline => Self::NotPaidBeforeDeadline,
        }
    }
}

impl From<CollectionOperationType> for db::CollectionOperationType {
    fn from(kind: CollectionOperationType) -> Self {
        match kind {
            CollectionOperationType::Pay => Self::Pay,
            CollectionOperationType::Discharge => Self::Discharge,
            CollectionOperationType::Refund => Self::Refund,
        }
    }
}

impl From<db::CollectionOperationType> for CollectionOperationType {
    fn from(kind: db::CollectionOperationType) -> Self {
        match kind {
            db::CollectionOperationType::Pay => Self::Pay,
            db::CollectionOperationType::Discharge => Self::Discharge,
            db::CollectionOperationType::Refund => Self::Refund,
        }
    }
}

impl From<ParentRole> for db::ParentRole {
    fn from(role: ParentRole) -> Self {
        match role {
            ParentRole::Member => Self::Member,
            ParentRole::Cashier => Self::Cashier,
        }
    }
}

impl From<db::ParentRole> for ParentRole {
    fn from(role: db::ParentRole) -> Self {
        match role {
            db::ParentRole::Member => Self::Member,
            db::ParentRole::Cashier => Self::Cashier,
        }
    }
}

pub(crate) fn bank_account(model: bank_accounts::Model) -> StoreResult<BankAccount> {
    Ok(BankAccount {
        id: BankAccountId::from_uuid(model.id),
        account_number: AccountNumber::parse(&model.account_number)
            .map_err(|e| corrupt("bank_accounts", e))?,
        is_locked: model.is_locked,
        created_at: utc(model.created_at),
    })
}

pub(crate) fn bank_operation(model: bank_operations::Model) -> BankOperation {
    BankOperation {
        id: BankOperationId(model.id),
        operation_date: utc(model.operation_date),
        amount: model.amount,
        title: model.title,
        description: model.description,
        source_account_id: model.source_account_id.map(BankAccountId::from_uuid),
        destination_account_id: model.destination_account_id.map(BankAccountId::from_uuid),
    }
}

pub(crate) fn collection(model: collections::Model) -> StoreResult<Collection> {
    Ok(Collection {
        id: CollectionId::from_uuid(model.id),
        name: model.name,
        description: model.description,
        start_date: utc(model.start_date),
        end_date: model.end_date.map(utc),
        price: Amount::new(model.price).map_err(|e| corrupt("collections", e))?,
        status: model.status.into(),
        class_group_id: ClassGroupId::from_uuid(model.class_group_id),
        bank_account_id: BankAccountId::from_uuid(model.bank_account_id),
        owner_id: ParentId::from_uuid(model.owner_id),
        withdrawn_money: model.withdrawn_money,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

pub(crate) fn collection_operation(model: collection_operations::Model) -> CollectionOperation {
    CollectionOperation {
        id: CollectionOperationId(model.id),
        child_id: ChildId::from_uuid(model.child_id),
        collection_id: CollectionId::from_uuid(model.collection_id),
        operation_type: model.operation_type.into(),
        requester_id: ParentId::from_uuid(model.requester_id),
        operation_date: utc(model.operation_date),
        payment_id: model.payment_id.map(BankOperationId),
    }
}

pub(crate) fn parent(model: parents::Model) -> Parent {
    Parent {
        id: ParentId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        name: model.name,
        surname: model.surname,
        bank_account_id: BankAccountId::from_uuid(model.bank_account_id),
    }
}

pub(crate) fn child(model: children::Model) -> Child {
    Child {
        id: ChildId::from_uuid(model.id),
        name: model.name,
        surname: model.surname,
        class_group_id: ClassGroupId::from_uuid(model.class_group_id),
    }
}

pub(crate) fn class_group(model: class_groups::Model) -> ClassGroup {
    ClassGroup {
        id: ClassGroupId::from_uuid(model.id),
        name: model.name,
        description: model.description,
    }
}

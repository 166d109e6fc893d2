//! `SeaORM` active enums mirroring the Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `collection_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "collection_status")]
pub enum CollectionStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "BLOCKED")]
    Blocked,
    #[sea_orm(string_value = "FINISHED")]
    Finished,
    #[sea_orm(string_value = "NOT_PAID_BEFORE_DEADLINE")]
    NotPaidBeforeDeadline,
}

/// `collection_operation_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "collection_operation_type"
)]
pub enum CollectionOperationType {
    #[sea_orm(string_value = "PAY")]
    Pay,
    #[sea_orm(string_value = "DISCHARGE")]
    Discharge,
    #[sea_orm(string_value = "REFUND")]
    Refund,
}

/// `parent_role`
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "parent_role")]
pub enum ParentRole {
    #[sea_orm(string_value = "MEMBER")]
    Member,
    #[sea_orm(string_value = "CASHIER")]
    Cashier,
}

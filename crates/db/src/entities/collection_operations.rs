//! `SeaORM` Entity for collection_operations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::CollectionOperationType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "collection_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub child_id: Uuid,
    pub collection_id: Uuid,
    pub operation_type: CollectionOperationType,
    pub requester_id: Uuid,
    pub operation_date: DateTimeWithTimeZone,
    #[sea_orm(unique)]
    pub payment_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collections::Entity",
        from = "Column::CollectionId",
        to = "super::collections::Column::Id",
        on_delete = "Cascade"
    )]
    Collections,
    #[sea_orm(
        belongs_to = "super::children::Entity",
        from = "Column::ChildId",
        to = "super::children::Column::Id"
    )]
    Children,
    #[sea_orm(
        belongs_to = "super::parents::Entity",
        from = "Column::RequesterId",
        to = "super::parents::Column::Id"
    )]
    Requester,
    #[sea_orm(
        belongs_to = "super::bank_operations::Entity",
        from = "Column::PaymentId",
        to = "super::bank_operations::Column::Id"
    )]
    Payment,
}

impl Related<super::collections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collections.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

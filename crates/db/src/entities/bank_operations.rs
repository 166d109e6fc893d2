//! `SeaORM` Entity for bank_operations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub operation_date: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub amount: Decimal,
    pub title: String,
    pub description: Option<String>,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bank_accounts::Entity",
        from = "Column::SourceAccountId",
        to = "super::bank_accounts::Column::Id"
    )]
    Source,
    #[sea_orm(
        belongs_to = "super::bank_accounts::Entity",
        from = "Column::DestinationAccountId",
        to = "super::bank_accounts::Column::Id"
    )]
    Destination,
}

impl ActiveModelBehavior for ActiveModel {}

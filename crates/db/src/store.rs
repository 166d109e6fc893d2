//! PostgreSQL implementation of the core storage seam.
//!
//! One `DbTx` wraps one SeaORM `DatabaseTransaction`. Row locks are taken with
//! `SELECT ... FOR UPDATE`; dropping the transaction rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, JoinType, NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, SqlErr, TransactionTrait, Unchanged,
};
use tracing::debug;

use schoolmoney_core::access::{Child, ClassGroup, Parent, ParentRole};
use schoolmoney_core::collection::{Collection, CollectionOperation, NewCollectionOperation};
use schoolmoney_core::iban::AccountNumber;
use schoolmoney_core::ledger::{BankAccount, BankOperation, NewBankOperation};
use schoolmoney_core::store::{LedgerStore, LedgerTx, StoreError, StoreResult};
use schoolmoney_shared::types::{
    BankAccountId, ChildId, ClassGroupId, CollectionId, CollectionOperationId, ParentId, UserId,
};

use crate::convert::{self, fixed};
use crate::entities::{
    bank_accounts, bank_operations, children, class_group_roles, class_groups,
    collection_operations, collections, parenthoods, parents,
    sea_orm_active_enums::ParentRole as DbParentRole,
};

/// Maps driver errors onto the storage taxonomy.
///
/// Unique violations become `Conflict` so callers can retry or report them;
/// everything else is an opaque backend failure.
pub(crate) fn store_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(sql) => constraint_err(sql).unwrap_or_else(|| StoreError::Backend(err.to_string())),
        None => StoreError::Backend(err.to_string()),
    }
}

/// Constraint messages name tables and key values, so they are logged and
/// replaced by a fixed text before reaching callers.
fn constraint_err(sql: SqlErr) -> Option<StoreError> {
    match sql {
        SqlErr::UniqueConstraintViolation(msg) => {
            debug!(error = %msg, "unique constraint violated");
            Some(StoreError::Conflict(
                "a record with the same key already exists".into(),
            ))
        }
        SqlErr::ForeignKeyConstraintViolation(msg) => {
            debug!(error = %msg, "foreign key constraint violated");
            Some(StoreError::NotFound(
                "a referenced record does not exist".into(),
            ))
        }
        _ => None,
    }
}

/// `LedgerStore` over a SeaORM connection pool.
#[derive(Debug, Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for DbStore {
    type Tx = DbTx;

    async fn begin(&self) -> StoreResult<DbTx> {
        let txn = self.db.begin().await.map_err(store_err)?;
        Ok(DbTx { txn })
    }
}

/// Transaction over a `DbStore`.
pub struct DbTx {
    txn: DatabaseTransaction,
}

impl std::fmt::Debug for DbTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbTx").finish_non_exhaustive()
    }
}

impl DbTx {
    async fn sum_amount(&self, filter: Condition) -> StoreResult<Decimal> {
        let total: Option<Option<Decimal>> = bank_operations::Entity::find()
            .select_only()
            .column_as(Expr::col(bank_operations::Column::Amount).sum(), "total")
            .filter(filter)
            .into_tuple()
            .one(&self.txn)
            .await
            .map_err(store_err)?;
        Ok(total.flatten().unwrap_or(Decimal::ZERO))
    }
}

#[async_trait]
impl LedgerTx for DbTx {
    // ========== Bank accounts ==========

    async fn insert_account(&mut self, account: &BankAccount) -> StoreResult<()> {
        // A failed insert aborts the surrounding Postgres transaction, so the
        // attempt runs in a savepoint.
        let savepoint = self.txn.begin().await.map_err(store_err)?;
        let inserted = bank_accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            account_number: Set(account.account_number.as_str().to_string()),
            is_locked: Set(account.is_locked),
            created_at: Set(fixed(account.created_at)),
        }
        .insert(&savepoint)
        .await;
        match inserted {
            Ok(_) => savepoint.commit().await.map_err(store_err),
            Err(err) => {
                savepoint.rollback().await.map_err(store_err)?;
                Err(store_err(err))
            }
        }
    }

    async fn find_account(&mut self, id: BankAccountId) -> StoreResult<Option<BankAccount>> {
        bank_accounts::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::bank_account)
            .transpose()
    }

    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> StoreResult<Option<BankAccount>> {
        bank_accounts::Entity::find()
            .filter(bank_accounts::Column::AccountNumber.eq(number.as_str()))
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::bank_account)
            .transpose()
    }

    async fn lock_account(&mut self, id: BankAccountId) -> StoreResult<Option<BankAccount>> {
        bank_accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::bank_account)
            .transpose()
    }

    async fn set_account_lock(&mut self, id: BankAccountId, locked: bool) -> StoreResult<()> {
        let result = bank_accounts::Entity::update_many()
            .col_expr(bank_accounts::Column::IsLocked, Expr::value(locked))
            .filter(bank_accounts::Column::Id.eq(id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(store_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("bank account {id}")));
        }
        Ok(())
    }

    async fn balance(&mut self, id: BankAccountId) -> StoreResult<Decimal> {
        let id = id.into_inner();
        let incoming = self
            .sum_amount(Condition::all().add(bank_operations::Column::DestinationAccountId.eq(id)))
            .await?;
        let outgoing = self
            .sum_amount(Condition::all().add(bank_operations::Column::SourceAccountId.eq(id)))
            .await?;
        Ok(incoming - outgoing)
    }

    async fn insert_operation(
        &mut self,
        op: &NewBankOperation,
        at: DateTime<Utc>,
    ) -> StoreResult<BankOperation> {
        let model = bank_operations::ActiveModel {
            id: NotSet,
            operation_date: Set(fixed(at)),
            amount: Set(op.amount.value()),
            title: Set(op.title.clone()),
            description: Set(op.description.clone()),
            source_account_id: Set(op.source_account_id.map(BankAccountId::into_inner)),
            destination_account_id: Set(op.destination_account_id.map(BankAccountId::into_inner)),
        }
        .insert(&self.txn)
        .await
        .map_err(store_err)?;
        debug!(operation_id = model.id, "bank operation inserted");
        Ok(convert::bank_operation(model))
    }

    async fn account_operations(&mut self, id: BankAccountId) -> StoreResult<Vec<BankOperation>> {
        let id = id.into_inner();
        let rows = bank_operations::Entity::find()
            .filter(
                Condition::any()
                    .add(bank_operations::Column::SourceAccountId.eq(id))
                    .add(bank_operations::Column::DestinationAccountId.eq(id)),
            )
            .order_by_asc(bank_operations::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(convert::bank_operation).collect())
    }

    // ========== Collections ==========

    async fn find_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
        collections::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::collection)
            .transpose()
    }

    async fn lock_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
        collections::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::collection)
            .transpose()
    }

    async fn insert_collection(&mut self, collection: &Collection) -> StoreResult<()> {
        collections::ActiveModel {
            id: Set(collection.id.into_inner()),
            name: Set(collection.name.clone()),
            description: Set(collection.description.clone()),
            start_date: Set(fixed(collection.start_date)),
            end_date: Set(collection.end_date.map(fixed)),
            price: Set(collection.price.value()),
            status: Set(collection.status.into()),
            class_group_id: Set(collection.class_group_id.into_inner()),
            bank_account_id: Set(collection.bank_account_id.into_inner()),
            owner_id: Set(collection.owner_id.into_inner()),
            withdrawn_money: Set(collection.withdrawn_money),
            created_at: Set(fixed(collection.created_at)),
            updated_at: Set(fixed(collection.updated_at)),
        }
        .insert(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn update_collection(&mut self, collection: &Collection) -> StoreResult<()> {
        let updated = collections::ActiveModel {
            id: Unchanged(collection.id.into_inner()),
            name: Set(collection.name.clone()),
            description: Set(collection.description.clone()),
            end_date: Set(collection.end_date.map(fixed)),
            price: Set(collection.price.value()),
            status: Set(collection.status.into()),
            withdrawn_money: Set(collection.withdrawn_money),
            updated_at: Set(fixed(collection.updated_at)),
            ..Default::default()
        }
        .update(&self.txn)
        .await;
        match updated {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => {
                Err(StoreError::NotFound(format!("collection {}", collection.id)))
            }
            Err(err) => Err(store_err(err)),
        }
    }

    async fn class_collections(&mut self, class: ClassGroupId) -> StoreResult<Vec<Collection>> {
        collections::Entity::find()
            .filter(collections::Column::ClassGroupId.eq(class.into_inner()))
            .order_by_asc(collections::Column::CreatedAt)
            .order_by_asc(collections::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(convert::collection)
            .collect()
    }

    async fn collection_operations(
        &mut self,
        collection: CollectionId,
    ) -> StoreResult<Vec<CollectionOperation>> {
        let rows = collection_operations::Entity::find()
            .filter(collection_operations::Column::CollectionId.eq(collection.into_inner()))
            .order_by_asc(collection_operations::Column::OperationDate)
            .order_by_asc(collection_operations::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(convert::collection_operation).collect())
    }

    async fn insert_collection_operation(
        &mut self,
        op: &NewCollectionOperation,
    ) -> StoreResult<CollectionOperation> {
        let model = collection_operations::ActiveModel {
            id: NotSet,
            child_id: Set(op.child_id.into_inner()),
            collection_id: Set(op.collection_id.into_inner()),
            operation_type: Set(op.operation_type.into()),
            requester_id: Set(op.requester_id.into_inner()),
            operation_date: Set(fixed(op.operation_date)),
            payment_id: Set(op.payment_id.map(|p| p.into_inner())),
        }
        .insert(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(convert::collection_operation(model))
    }

    async fn delete_collection_operation(&mut self, id: CollectionOperationId) -> StoreResult<()> {
        let result = collection_operations::Entity::delete_by_id(id.into_inner())
            .exec(&self.txn)
            .await
            .map_err(store_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("collection operation {id}")));
        }
        Ok(())
    }

    // ========== Directory ==========

    async fn find_parent(&mut self, id: ParentId) -> StoreResult<Option<Parent>> {
        Ok(parents::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::parent))
    }

    async fn find_parent_by_user(&mut self, user: UserId) -> StoreResult<Option<Parent>> {
        Ok(parents::Entity::find()
            .filter(parents::Column::UserId.eq(user.into_inner()))
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::parent))
    }

    async fn insert_parent(&mut self, parent: &Parent) -> StoreResult<()> {
        parents::ActiveModel {
            id: Set(parent.id.into_inner()),
            user_id: Set(parent.user_id.into_inner()),
            name: Set(parent.name.clone()),
            surname: Set(parent.surname.clone()),
            bank_account_id: Set(parent.bank_account_id.into_inner()),
        }
        .insert(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_child(&mut self, id: ChildId) -> StoreResult<Option<Child>> {
        Ok(children::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::child))
    }

    async fn insert_child(&mut self, child: &Child) -> StoreResult<()> {
        children::ActiveModel {
            id: Set(child.id.into_inner()),
            name: Set(child.name.clone()),
            surname: Set(child.surname.clone()),
            class_group_id: Set(child.class_group_id.into_inner()),
        }
        .insert(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn insert_parenthood(&mut self, parent: ParentId, child: ChildId) -> StoreResult<()> {
        parenthoods::Entity::insert(parenthoods::ActiveModel {
            parent_id: Set(parent.into_inner()),
            child_id: Set(child.into_inner()),
        })
        .exec_without_returning(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn is_guardian(&mut self, parent: ParentId, child: ChildId) -> StoreResult<bool> {
        Ok(
            parenthoods::Entity::find_by_id((parent.into_inner(), child.into_inner()))
                .one(&self.txn)
                .await
                .map_err(store_err)?
                .is_some(),
        )
    }

    async fn has_child_in_class(
        &mut self,
        parent: ParentId,
        class: ClassGroupId,
    ) -> StoreResult<bool> {
        let count = parenthoods::Entity::find()
            .join(JoinType::InnerJoin, parenthoods::Relation::Children.def())
            .filter(parenthoods::Column::ParentId.eq(parent.into_inner()))
            .filter(children::Column::ClassGroupId.eq(class.into_inner()))
            .count(&self.txn)
            .await
            .map_err(store_err)?;
        Ok(count > 0)
    }

    async fn children_in_class(&mut self, class: ClassGroupId) -> StoreResult<Vec<Child>> {
        let rows = children::Entity::find()
            .filter(children::Column::ClassGroupId.eq(class.into_inner()))
            .order_by_asc(children::Column::Id)
            .all(&self.txn)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(convert::child).collect())
    }

    async fn find_class_group(&mut self, id: ClassGroupId) -> StoreResult<Option<ClassGroup>> {
        Ok(class_groups::Entity::find_by_id(id.into_inner())
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(convert::class_group))
    }

    async fn insert_class_group(&mut self, group: &ClassGroup) -> StoreResult<()> {
        class_groups::ActiveModel {
            id: Set(group.id.into_inner()),
            name: Set(group.name.clone()),
            description: Set(group.description.clone()),
        }
        .insert(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn group_role(
        &mut self,
        class: ClassGroupId,
        parent: ParentId,
    ) -> StoreResult<Option<ParentRole>> {
        Ok(
            class_group_roles::Entity::find_by_id((class.into_inner(), parent.into_inner()))
                .one(&self.txn)
                .await
                .map_err(store_err)?
                .map(|row| row.role.into()),
        )
    }

    async fn set_group_role(
        &mut self,
        class: ClassGroupId,
        parent: ParentId,
        role: ParentRole,
    ) -> StoreResult<()> {
        class_group_roles::Entity::insert(class_group_roles::ActiveModel {
            class_group_id: Set(class.into_inner()),
            parent_id: Set(parent.into_inner()),
            role: Set(role.into()),
        })
        .on_conflict(
            OnConflict::columns([
                class_group_roles::Column::ClassGroupId,
                class_group_roles::Column::ParentId,
            ])
            .update_column(class_group_roles::Column::Role)
            .to_owned(),
        )
        .exec_without_returning(&self.txn)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn cashier(&mut self, class: ClassGroupId) -> StoreResult<Option<ParentId>> {
        Ok(class_group_roles::Entity::find()
            .filter(class_group_roles::Column::ClassGroupId.eq(class.into_inner()))
            .filter(class_group_roles::Column::Role.eq(DbParentRole::Cashier))
            .one(&self.txn)
            .await
            .map_err(store_err)?
            .map(|row| ParentId::from_uuid(row.parent_id)))
    }

    // ========== Lifecycle ==========

    async fn commit(self) -> StoreResult<()> {
        self.txn.commit().await.map_err(store_err)
    }
}

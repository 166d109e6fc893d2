//! Storage seam for the ledger and collection engine.
//!
//! Every engine call opens one `LedgerTx`, does all its reads and writes
//! through it and commits. Dropping a transaction without committing rolls it
//! back; this is how request cancellation and failed legs leave no trace.
//!
//! Implementations:
//! - `memory::MemoryStore` - in-process, for tests and local runs
//! - `schoolmoney_db::DbStore` - PostgreSQL via SeaORM

pub mod error;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schoolmoney_shared::types::{
    BankAccountId, ChildId, ClassGroupId, CollectionId, CollectionOperationId, ParentId, UserId,
};

use crate::access::types::{Child, ClassGroup, Parent, ParentRole};
use crate::collection::types::{Collection, CollectionOperation, NewCollectionOperation};
use crate::iban::AccountNumber;
use crate::ledger::types::{BankAccount, BankOperation, NewBankOperation};

pub use error::StoreError;
pub use memory::{ConcurrentWrite, MemoryStore};

/// Result alias for storage calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// A source of transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Transaction type.
    type Tx: LedgerTx;

    /// Opens a transaction.
    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// One open storage transaction.
#[async_trait]
pub trait LedgerTx: Send {
    // ========== Bank accounts ==========

    /// Inserts an account. A duplicate account number yields
    /// `StoreError::Conflict` and leaves the transaction usable.
    async fn insert_account(&mut self, account: &BankAccount) -> StoreResult<()>;

    /// Reads an account.
    async fn find_account(&mut self, id: BankAccountId) -> StoreResult<Option<BankAccount>>;

    /// Reads an account by its number.
    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> StoreResult<Option<BankAccount>>;

    /// Reads an account and holds a write lock on it until commit.
    async fn lock_account(&mut self, id: BankAccountId) -> StoreResult<Option<BankAccount>>;

    /// Sets the lock flag of an account.
    async fn set_account_lock(&mut self, id: BankAccountId, locked: bool) -> StoreResult<()>;

    /// Incoming minus outgoing over the account's operations.
    async fn balance(&mut self, id: BankAccountId) -> StoreResult<Decimal>;

    /// Appends a ledger row stamped with `at`.
    async fn insert_operation(
        &mut self,
        op: &NewBankOperation,
        at: DateTime<Utc>,
    ) -> StoreResult<BankOperation>;

    /// Every row touching the account, ordered by id.
    async fn account_operations(&mut self, id: BankAccountId) -> StoreResult<Vec<BankOperation>>;

    // ========== Collections ==========

    /// Reads a collection.
    async fn find_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>>;

    /// Reads a collection and holds a write lock on it until commit.
    async fn lock_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>>;

    /// Inserts a collection.
    async fn insert_collection(&mut self, collection: &Collection) -> StoreResult<()>;

    /// Overwrites the mutable fields of a collection.
    async fn update_collection(&mut self, collection: &Collection) -> StoreResult<()>;

    /// Collections of a class group, oldest first.
    async fn class_collections(&mut self, class: ClassGroupId) -> StoreResult<Vec<Collection>>;

    /// Participation log of a collection ordered by (operation_date, id).
    async fn collection_operations(
        &mut self,
        collection: CollectionId,
    ) -> StoreResult<Vec<CollectionOperation>>;

    /// Appends a participation row.
    async fn insert_collection_operation(
        &mut self,
        op: &NewCollectionOperation,
    ) -> StoreResult<CollectionOperation>;

    /// Deletes a participation row.
    async fn delete_collection_operation(&mut self, id: CollectionOperationId) -> StoreResult<()>;

    // ========== Directory ==========

    /// Reads a parent profile.
    async fn find_parent(&mut self, id: ParentId) -> StoreResult<Option<Parent>>;

    /// Reads the parent profile of a user.
    async fn find_parent_by_user(&mut self, user: UserId) -> StoreResult<Option<Parent>>;

    /// Inserts a parent profile. A second profile for a user is a conflict.
    async fn insert_parent(&mut self, parent: &Parent) -> StoreResult<()>;

    /// Reads a child.
    async fn find_child(&mut self, id: ChildId) -> StoreResult<Option<Child>>;

    /// Inserts a child.
    async fn insert_child(&mut self, child: &Child) -> StoreResult<()>;

    /// Records that `parent` is a guardian of `child`.
    async fn insert_parenthood(&mut self, parent: ParentId, child: ChildId) -> StoreResult<()>;

    /// True if `parent` is a guardian of `child`.
    async fn is_guardian(&mut self, parent: ParentId, child: ChildId) -> StoreResult<bool>;

    /// True if `parent` is a guardian of any child in `class`.
    async fn has_child_in_class(&mut self, parent: ParentId, class: ClassGroupId)
    -> StoreResult<bool>;

    /// Children of a class group.
    async fn children_in_class(&mut self, class: ClassGroupId) -> StoreResult<Vec<Child>>;

    /// Reads a class group.
    async fn find_class_group(&mut self, id: ClassGroupId) -> StoreResult<Option<ClassGroup>>;

    /// Inserts a class group. Names are unique.
    async fn insert_class_group(&mut self, group: &ClassGroup) -> StoreResult<()>;

    /// Role of `parent` in `class`.
    async fn group_role(
        &mut self,
        class: ClassGroupId,
        parent: ParentId,
    ) -> StoreResult<Option<ParentRole>>;

    /// Sets (inserts or replaces) the role of `parent` in `class`.
    async fn set_group_role(
        &mut self,
        class: ClassGroupId,
        parent: ParentId,
        role: ParentRole,
    ) -> StoreResult<()>;

    /// The cashier of `class`, if any.
    async fn cashier(&mut self, class: ClassGroupId) -> StoreResult<Option<ParentId>>;

    // ========== Lifecycle ==========

    /// Makes every write of this transaction visible.
    async fn commit(self) -> StoreResult<()>;
}

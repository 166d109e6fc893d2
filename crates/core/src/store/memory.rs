//! In-process store.
//!
//! Transactions are serialised behind one async mutex. Each transaction works
//! on a private copy of the state which replaces the shared state on commit,
//! so a dropped transaction leaves nothing behind.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex as SyncMutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schoolmoney_shared::types::{
    BankAccountId, BankOperationId, ChildId, ClassGroupId, CollectionId, CollectionOperationId,
    ParentId, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTx, StoreError, StoreResult};
use crate::access::types::{Child, ClassGroup, Parent, ParentRole};
use crate::collection::types::{Collection, CollectionOperation, NewCollectionOperation};
use crate::iban::AccountNumber;
use crate::ledger::types::{BankAccount, BankOperation, NewBankOperation};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: HashMap<BankAccountId, BankAccount>,
    account_numbers: HashSet<AccountNumber>,
    operations: BTreeMap<BankOperationId, BankOperation>,
    next_operation_id: i64,
    collections: HashMap<CollectionId, Collection>,
    collection_operations: BTreeMap<CollectionOperationId, CollectionOperation>,
    next_collection_operation_id: i64,
    parents: HashMap<ParentId, Parent>,
    children: HashMap<ChildId, Child>,
    parenthoods: HashSet<(ParentId, ChildId)>,
    class_groups: HashMap<ClassGroupId, ClassGroup>,
    roles: HashMap<(ClassGroupId, ParentId), ParentRole>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Countdown to a failing `insert_operation`; 0 disables.
    operation_insert: AtomicUsize,
    commit: AtomicBool,
    landing: SyncMutex<Vec<ConcurrentWrite>>,
}

impl Faults {
    fn trip_operation_insert(&self) -> bool {
        self.operation_insert
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok_and(|previous| previous == 1)
    }

    fn take_landing(&self) -> Vec<ConcurrentWrite> {
        self.landing
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }
}

/// A money movement plus its participation row, committed by some other
/// transaction. The row's `payment_id` is filled in with the ledger row.
#[derive(Debug, Clone)]
pub struct ConcurrentWrite {
    /// Ledger leg.
    pub transfer: NewBankOperation,
    /// Participation row pointing at the leg.
    pub row: NewCollectionOperation,
}

/// In-process `LedgerStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`-th `insert_operation` from now on fail once (1-based).
    pub fn fail_nth_operation_insert(&self, n: usize) {
        self.faults.operation_insert.store(n, Ordering::SeqCst);
    }

    /// Makes the next commit fail once.
    pub fn fail_next_commit(&self) {
        self.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Makes `writes` visible to the next transaction that calls
    /// `lock_collection`, as if another transaction had committed them while
    /// that one waited for the row lock.
    pub fn land_before_next_collection_lock(&self, writes: Vec<ConcurrentWrite>) {
        if let Ok(mut pending) = self.faults.landing.lock() {
            pending.extend(writes);
        }
    }

    /// Number of committed ledger rows.
    pub async fn operation_count(&self) -> usize {
        self.state.lock().await.operations.len()
    }

    /// Number of committed participation rows.
    pub async fn collection_operation_count(&self) -> usize {
        self.state.lock().await.collection_operations.len()
    }

    /// Number of committed bank accounts.
    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx {
            guard,
            work,
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Transaction over a `MemoryStore`.
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
    faults: Arc<Faults>,
}

fn missing(what: &str, id: impl std::fmt::Display) -> StoreError {
    StoreError::NotFound(format!("{what} {id}"))
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn insert_account(&mut self, account: &BankAccount) -> StoreResult<()> {
        if self.work.account_numbers.contains(&account.account_number) {
            return Err(StoreError::Conflict(format!(
                "account number {} already exists",
                account.account_number
            )));
        }
        self.work
            .account_numbers
            .insert(account.account_number.clone());
        self.work.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_account(&mut self, id: BankAccountId) -> StoreResult<Option<BankAccount>> {
        Ok(self.work.accounts.get(&id).cloned())
    }

    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> StoreResult<Option<BankAccount>> {
        Ok(self
            .work
            .accounts
            .values()
            .find(|a| &a.account_number == number)
            .cloned())
    }

    async fn lock_account(&mut self, id: BankAccountId) -> StoreResult<Option<BankAccount>> {
        // The whole store is already held exclusively.
        self.find_account(id).await
    }

    async fn set_account_lock(&mut self, id: BankAccountId, locked: bool) -> StoreResult<()> {
        let account = self
            .work
            .accounts
            .get_mut(&id)
            .ok_or_else(|| missing("bank account", id))?;
        account.is_locked = locked;
        Ok(())
    }

    async fn balance(&mut self, id: BankAccountId) -> StoreResult<Decimal> {
        Ok(self
            .work
            .operations
            .values()
            .map(|op| op.effect_on(id))
            .sum())
    }

    async fn insert_operation(
        &mut self,
        op: &NewBankOperation,
        at: DateTime<Utc>,
    ) -> StoreResult<BankOperation> {
        if self.faults.trip_operation_insert() {
            return Err(StoreError::Backend("injected operation insert failure".into()));
        }
        for side in [op.source_account_id, op.destination_account_id]
            .into_iter()
            .flatten()
        {
            if !self.work.accounts.contains_key(&side) {
                return Err(missing("bank account", side));
            }
        }
        self.work.next_operation_id += 1;
        let row = BankOperation {
            id: BankOperationId(self.work.next_operation_id),
            operation_date: at,
            amount: op.amount.value(),
            title: op.title.clone(),
            description: op.description.clone(),
            source_account_id: op.source_account_id,
            destination_account_id: op.destination_account_id,
        };
        self.work.operations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn account_operations(&mut self, id: BankAccountId) -> StoreResult<Vec<BankOperation>> {
        Ok(self
            .work
            .operations
            .values()
            .filter(|op| op.source_account_id == Some(id) || op.destination_account_id == Some(id))
            .cloned()
            .collect())
    }

    async fn find_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
        Ok(self.work.collections.get(&id).cloned())
    }

    async fn lock_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
        for write in self.faults.take_landing() {
            let leg = self.insert_operation(&write.transfer, Utc::now()).await?;
            let mut row = write.row;
            row.payment_id = Some(leg.id);
            self.insert_collection_operation(&row).await?;
        }
        self.find_collection(id).await
    }

    async fn insert_collection(&mut self, collection: &Collection) -> StoreResult<()> {
        if self
            .work
            .collections
            .values()
            .any(|c| c.bank_account_id == collection.bank_account_id)
        {
            return Err(StoreError::Conflict(format!(
                "bank account {} already backs a collection",
                collection.bank_account_id
            )));
        }
        self.work
            .collections
            .insert(collection.id, collection.clone());
        Ok(())
    }

    async fn update_collection(&mut self, collection: &Collection) -> StoreResult<()> {
        let slot = self
            .work
            .collections
            .get_mut(&collection.id)
            .ok_or_else(|| missing("collection", collection.id))?;
        *slot = collection.clone();
        Ok(())
    }

    async fn class_collections(&mut self, class: ClassGroupId) -> StoreResult<Vec<Collection>> {
        let mut found: Vec<Collection> = self
            .work
            .collections
            .values()
            .filter(|c| c.class_group_id == class)
            .cloned()
            .collect();
        found.sort_by_key(|c| (c.created_at, c.id));
        Ok(found)
    }

    async fn collection_operations(
        &mut self,
        collection: CollectionId,
    ) -> StoreResult<Vec<CollectionOperation>> {
        let mut rows: Vec<CollectionOperation> = self
            .work
            .collection_operations
            .values()
            .filter(|row| row.collection_id == collection)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.operation_date, row.id));
        Ok(rows)
    }

    async fn insert_collection_operation(
        &mut self,
        op: &NewCollectionOperation,
    ) -> StoreResult<CollectionOperation> {
        self.work.next_collection_operation_id += 1;
        let row = CollectionOperation {
            id: CollectionOperationId(self.work.next_collection_operation_id),
            child_id: op.child_id,
            collection_id: op.collection_id,
            operation_type: op.operation_type,
            requester_id: op.requester_id,
            operation_date: op.operation_date,
            payment_id: op.payment_id,
        };
        self.work.collection_operations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_collection_operation(&mut self, id: CollectionOperationId) -> StoreResult<()> {
        self.work
            .collection_operations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("collection operation", id))
    }

    async fn find_parent(&mut self, id: ParentId) -> StoreResult<Option<Parent>> {
        Ok(self.work.parents.get(&id).cloned())
    }

    async fn find_parent_by_user(&mut self, user: UserId) -> StoreResult<Option<Parent>> {
        Ok(self
            .work
            .parents
            .values()
            .find(|p| p.user_id == user)
            .cloned())
    }

    async fn insert_parent(&mut self, parent: &Parent) -> StoreResult<()> {
        if self.work.parents.values().any(|p| p.user_id == parent.user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already has a parent profile",
                parent.user_id
            )));
        }
        self.work.parents.insert(parent.id, parent.clone());
        Ok(())
    }

    async fn find_child(&mut self, id: ChildId) -> StoreResult<Option<Child>> {
        Ok(self.work.children.get(&id).cloned())
    }

    async fn insert_child(&mut self, child: &Child) -> StoreResult<()> {
        self.work.children.insert(child.id, child.clone());
        Ok(())
    }

    async fn insert_parenthood(&mut self, parent: ParentId, child: ChildId) -> StoreResult<()> {
        if !self.work.parenthoods.insert((parent, child)) {
            return Err(StoreError::Conflict(format!(
                "parent {parent} is already a guardian of {child}"
            )));
        }
        Ok(())
    }

    async fn is_guardian(&mut self, parent: ParentId, child: ChildId) -> StoreResult<bool> {
        Ok(self.work.parenthoods.contains(&(parent, child)))
    }

    async fn has_child_in_class(
        &mut self,
        parent: ParentId,
        class: ClassGroupId,
    ) -> StoreResult<bool> {
        Ok(self.work.parenthoods.iter().any(|(p, c)| {
            *p == parent
                && self
                    .work
                    .children
                    .get(c)
                    .is_some_and(|child| child.class_group_id == class)
        }))
    }

    async fn children_in_class(&mut self, class: ClassGroupId) -> StoreResult<Vec<Child>> {
        let mut found: Vec<Child> = self
            .work
            .children
            .values()
            .filter(|c| c.class_group_id == class)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.id);
        Ok(found)
    }

    async fn find_class_group(&mut self, id: ClassGroupId) -> StoreResult<Option<ClassGroup>> {
        Ok(self.work.class_groups.get(&id).cloned())
    }

    async fn insert_class_group(&mut self, group: &ClassGroup) -> StoreResult<()> {
        if self.work.class_groups.values().any(|g| g.name == group.name) {
            return Err(StoreError::Conflict(format!(
                "class group {} already exists",
                group.name
            )));
        }
        self.work.class_groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn group_role(
        &mut self,
        class: ClassGroupId,
        parent: ParentId,
    ) -> StoreResult<Option<ParentRole>> {
        Ok(self.work.roles.get(&(class, parent)).copied())
    }

    async fn set_group_role(
        &mut self,
        class: ClassGroupId,
        parent: ParentId,
        role: ParentRole,
    ) -> StoreResult<()> {
        self.work.roles.insert((class, parent), role);
        Ok(())
    }

    async fn cashier(&mut self, class: ClassGroupId) -> StoreResult<Option<ParentId>> {
        Ok(self
            .work
            .roles
            .iter()
            .find(|((c, _), role)| *c == class && **role == ParentRole::Cashier)
            .map(|((_, parent), _)| *parent))
    }

    async fn commit(self) -> StoreResult<()> {
        if self.faults.commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let Self { mut guard, work, .. } = self;
        *guard = work;
        Ok(())
    }
}

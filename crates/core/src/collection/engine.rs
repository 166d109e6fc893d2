//! Collection lifecycle engine.
//!
//! Every public method is one storage transaction. Balance-changing calls
//! follow one lock order: read the collection, lock the involved bank
//! accounts in ascending id order, lock the collection row, then re-validate
//! state on the locked row before writing.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use schoolmoney_shared::types::{
    Amount, BankAccountId, ChildId, ClassGroupId, CollectionId, ParentId,
};
use tracing::{info, warn};

use super::state::CollectionStateMachine;
use super::types::{
    Collection, CollectionOperation, CollectionOperationType, CollectionStatus, CreateCollection,
    FinishOutcome, NewCollectionOperation, ParticipationStatus, UpdateCollection,
    latest_per_child, next_operation_date, participation_of, refund_recipient,
};
use crate::access::{AccessGuard, Actor, Child, Parent};
use crate::iban::AccountNumber;
use crate::ledger::{
    AccountBalance, AccountFactory, LedgerError, LedgerService, NewBankOperation,
};
use crate::store::{LedgerStore, LedgerTx};

/// Orchestrates collection state and the ledger writes behind it.
#[derive(Debug)]
pub struct CollectionEngine<S> {
    store: Arc<S>,
    accounts: AccountFactory,
}

impl<S> Clone for CollectionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            accounts: self.accounts.clone(),
        }
    }
}

/// A paid child found while cancelling.
struct PaidChild {
    child: ChildId,
    payer: ParentId,
}

impl<S: LedgerStore> CollectionEngine<S> {
    /// Creates the engine.
    #[must_use]
    pub const fn new(store: Arc<S>, accounts: AccountFactory) -> Self {
        Self { store, accounts }
    }

    // ========== Creation & reads ==========

    /// Creates an open collection together with its bank account.
    ///
    /// # Errors
    ///
    /// - `ClassGroupNotFound` if the class does not exist
    /// - `ProfileNotFound` if the actor has no parent profile
    /// - `Validation` / `InvalidAmount` for bad input
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateCollection,
    ) -> Result<Collection, LedgerError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::Validation("collection name is required".into()));
        }
        let price = Amount::new(input.price)?;
        let now = Utc::now();
        let start_date = input.start_date.unwrap_or(now);
        if input.end_date.is_some_and(|end| end < start_date) {
            return Err(LedgerError::Validation(
                "end date must not precede start date".into(),
            ));
        }

        let mut tx = self.store.begin().await?;
        tx.find_class_group(input.class_group_id)
            .await?
            .ok_or(LedgerError::ClassGroupNotFound(input.class_group_id))?;
        let owner = AccessGuard::require_parent(&mut tx, actor).await?;

        let account = self.accounts.create_account(&mut tx).await?;
        let collection = Collection {
            id: CollectionId::new(),
            name,
            description: input.description,
            start_date,
            end_date: input.end_date,
            price,
            status: CollectionStatus::Open,
            class_group_id: input.class_group_id,
            bank_account_id: account.id,
            owner_id: owner.id,
            withdrawn_money: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        tx.insert_collection(&collection).await?;
        tx.commit().await?;

        info!(
            collection_id = %collection.id,
            class_group_id = %collection.class_group_id,
            account_id = %account.id,
            price = %collection.price,
            "collection created"
        );
        Ok(collection)
    }

    /// Reads a collection the actor may view.
    pub async fn get(&self, actor: &Actor, id: CollectionId) -> Result<Collection, LedgerError> {
        let mut tx = self.store.begin().await?;
        let collection = Self::viewable(&mut tx, actor, id).await?;
        Ok(collection)
    }

    /// Collections of a class, optionally filtered by status.
    pub async fn list_for_class(
        &self,
        actor: &Actor,
        class: ClassGroupId,
        status: Option<CollectionStatus>,
    ) -> Result<Vec<Collection>, LedgerError> {
        let mut tx = self.store.begin().await?;
        tx.find_class_group(class)
            .await?
            .ok_or(LedgerError::ClassGroupNotFound(class))?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let allowed = AccessGuard::can_view_class(&mut tx, actor, parent.as_ref(), class).await?;
        AccessGuard::ensure(allowed, "not a member of this class group")?;

        let mut collections = tx.class_collections(class).await?;
        if let Some(status) = status {
            collections.retain(|c| c.status == status);
        }
        Ok(collections)
    }

    /// Participation log of a collection.
    pub async fn operations(
        &self,
        actor: &Actor,
        id: CollectionId,
    ) -> Result<Vec<CollectionOperation>, LedgerError> {
        let mut tx = self.store.begin().await?;
        Self::viewable(&mut tx, actor, id).await?;
        Ok(tx.collection_operations(id).await?)
    }

    // ========== Participation ==========

    /// Pays one child's share from the actor's wallet.
    ///
    /// # Errors
    ///
    /// - `CollectionState` unless the collection is open
    /// - `PermissionDenied` unless the actor is a guardian of the child
    /// - `ParticipationState` if the child is paid or discharged
    /// - `InsufficientFunds` if the wallet holds less than the price
    pub async fn pay(
        &self,
        actor: &Actor,
        id: CollectionId,
        child: ChildId,
    ) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let payer = AccessGuard::require_parent(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        Self::require_child_in_class(&mut tx, child, &snapshot).await?;
        Self::require_guardian(&mut tx, &payer, child).await?;

        let collection = Self::lock(
            &mut tx,
            &snapshot,
            &[payer.bank_account_id, snapshot.bank_account_id],
        )
        .await?;
        CollectionStateMachine::require_open(collection.status, "pay for")?;

        let rows = tx.collection_operations(id).await?;
        CollectionStateMachine::check_pay(child, participation_of(&rows, child))?;

        let price = collection.price;
        LedgerService::ensure_funds(&mut tx, payer.bank_account_id, price.value()).await?;
        let payment = LedgerService::transfer(
            &mut tx,
            payer.bank_account_id,
            collection.bank_account_id,
            price,
            format!("Payment: {}", collection.name),
            Some(format!("child {child}")),
        )
        .await?;
        tx.insert_collection_operation(&NewCollectionOperation {
            child_id: child,
            collection_id: id,
            operation_type: CollectionOperationType::Pay,
            requester_id: payer.id,
            operation_date: next_operation_date(&rows, child, Utc::now()),
            payment_id: Some(payment.id),
        })
        .await?;
        tx.commit().await?;

        info!(collection_id = %id, child_id = %child, payer = %payer.id, amount = %price, "child paid");
        Ok(())
    }

    /// Opts a child out of the collection. No money moves.
    pub async fn unsubscribe(
        &self,
        actor: &Actor,
        id: CollectionId,
        child: ChildId,
    ) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::require_parent(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        Self::require_child_in_class(&mut tx, child, &snapshot).await?;
        Self::require_guardian(&mut tx, &parent, child).await?;

        let collection = Self::lock(&mut tx, &snapshot, &[]).await?;
        CollectionStateMachine::require_open(collection.status, "unsubscribe from")?;

        let rows = tx.collection_operations(id).await?;
        CollectionStateMachine::check_unsubscribe(child, participation_of(&rows, child))?;
        tx.insert_collection_operation(&NewCollectionOperation {
            child_id: child,
            collection_id: id,
            operation_type: CollectionOperationType::Discharge,
            requester_id: parent.id,
            operation_date: next_operation_date(&rows, child, Utc::now()),
            payment_id: None,
        })
        .await?;
        tx.commit().await?;

        info!(collection_id = %id, child_id = %child, "child unsubscribed");
        Ok(())
    }

    /// Removes the child's discharge so it participates again.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` unless the effective row is a discharge;
    /// repeated calls never create rows. A refunded child is not restored
    /// here: its refund row stays in the history and paying again makes the
    /// child paid.
    pub async fn restore(
        &self,
        actor: &Actor,
        id: CollectionId,
        child: ChildId,
    ) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::require_parent(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        Self::require_guardian(&mut tx, &parent, child).await?;

        let collection = Self::lock(&mut tx, &snapshot, &[]).await?;
        CollectionStateMachine::require_open(collection.status, "restore a child in")?;

        let rows = tx.collection_operations(id).await?;
        let latest = latest_per_child(&rows).get(&child).map(|row| (*row).clone());
        CollectionStateMachine::check_restore(
            child,
            id,
            ParticipationStatus::from_latest(latest.as_ref().map(|row| row.operation_type)),
        )?;
        if let Some(row) = latest {
            tx.delete_collection_operation(row.id).await?;
        }
        tx.commit().await?;

        info!(collection_id = %id, child_id = %child, "child restored");
        Ok(())
    }

    /// Returns one child's payment to the parent who paid it.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` unless owner, class cashier or admin
    /// - `ParticipationState` unless the child is paid
    /// - `InsufficientFunds` if the collection account cannot cover the price
    pub async fn refund(
        &self,
        actor: &Actor,
        id: CollectionId,
        child: ChildId,
    ) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        let allowed =
            AccessGuard::can_manage_money(&mut tx, actor, parent.as_ref(), &snapshot).await?;
        AccessGuard::ensure(allowed, "only the owner, the class cashier or an admin can refund")?;

        let rows = tx.collection_operations(id).await?;
        CollectionStateMachine::check_refund(child, participation_of(&rows, child))?;

        // Only the debited account is locked; crediting the payer needs no lock.
        let collection = Self::lock(&mut tx, &snapshot, &[snapshot.bank_account_id]).await?;
        CollectionStateMachine::require_open(collection.status, "refund")?;

        // The payer comes from the rows read under the collection lock.
        let rows = tx.collection_operations(id).await?;
        CollectionStateMachine::check_refund(child, participation_of(&rows, child))?;
        let payer_id = refund_recipient(&rows, child).ok_or(LedgerError::OperationNotFound {
            child,
            collection: id,
            expected: "PAY",
        })?;
        let payer = tx
            .find_parent(payer_id)
            .await?
            .ok_or(LedgerError::ParentNotFound(payer_id))?;

        let price = collection.price;
        LedgerService::ensure_funds(&mut tx, collection.bank_account_id, price.value()).await?;
        let payment = LedgerService::transfer(
            &mut tx,
            collection.bank_account_id,
            payer.bank_account_id,
            price,
            format!("Refund: {}", collection.name),
            Some(format!("child {child}")),
        )
        .await?;
        tx.insert_collection_operation(&NewCollectionOperation {
            child_id: child,
            collection_id: id,
            operation_type: CollectionOperationType::Refund,
            requester_id: parent.as_ref().map_or(collection.owner_id, |p| p.id),
            operation_date: next_operation_date(&rows, child, Utc::now()),
            payment_id: Some(payment.id),
        })
        .await?;
        tx.commit().await?;

        info!(collection_id = %id, child_id = %child, payer = %payer.id, amount = %price, "payment refunded");
        Ok(())
    }

    // ========== Status changes ==========

    /// Cancels an open collection: refunds every paid child, then sweeps any
    /// residual balance to the owner. All-or-nothing.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` unless owner or admin
    /// - `CollectionState` unless open
    /// - `InsufficientFunds` if the account cannot cover every refund
    pub async fn cancel(&self, actor: &Actor, id: CollectionId) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        let allowed =
            actor.is_admin() || AccessGuard::is_collection_owner(parent.as_ref(), &snapshot);
        AccessGuard::ensure(allowed, "only the owner or an admin can cancel a collection")?;

        let owner = tx
            .find_parent(snapshot.owner_id)
            .await?
            .ok_or(LedgerError::ParentNotFound(snapshot.owner_id))?;
        let paid = Self::paid_children(&tx.collection_operations(id).await?);
        let mut wallets = vec![snapshot.bank_account_id, owner.bank_account_id];
        for entry in &paid {
            wallets.push(Self::wallet_of(&mut tx, entry.payer).await?);
        }

        let mut collection = Self::lock(&mut tx, &snapshot, &wallets).await?;
        CollectionStateMachine::require_open(collection.status, "cancel")?;

        // Re-read under the collection lock; only the collection account is
        // debited, so payers that appeared since the snapshot need no lock.
        let rows = tx.collection_operations(id).await?;
        let paid = Self::paid_children(&rows);
        let price = collection.price;
        let required = price.times(paid.len() as u64);
        LedgerService::ensure_funds(&mut tx, collection.bank_account_id, required).await?;

        for entry in &paid {
            let wallet = Self::wallet_of(&mut tx, entry.payer).await?;
            let payment = LedgerService::transfer(
                &mut tx,
                collection.bank_account_id,
                wallet,
                price,
                format!("Refund: {} (cancelled)", collection.name),
                Some(format!("child {}", entry.child)),
            )
            .await?;
            tx.insert_collection_operation(&NewCollectionOperation {
                child_id: entry.child,
                collection_id: id,
                operation_type: CollectionOperationType::Refund,
                requester_id: parent.as_ref().map_or(collection.owner_id, |p| p.id),
                operation_date: next_operation_date(&rows, entry.child, Utc::now()),
                payment_id: Some(payment.id),
            })
            .await?;
        }

        let residual = tx.balance(collection.bank_account_id).await?;
        if residual > Decimal::ZERO {
            let amount = Amount::new(residual)?;
            LedgerService::transfer(
                &mut tx,
                collection.bank_account_id,
                owner.bank_account_id,
                amount,
                format!("Closing balance: {}", collection.name),
                None,
            )
            .await?;
        } else if residual < Decimal::ZERO {
            warn!(collection_id = %id, %residual, "collection account negative after refunds");
        }

        collection.status = CollectionStateMachine::cancel(collection.status)?;
        collection.updated_at = Utc::now();
        tx.update_collection(&collection).await?;
        tx.commit().await?;

        info!(collection_id = %id, refunds = paid.len(), %residual, "collection cancelled");
        Ok(())
    }

    /// Pays money out of the collection account. Owner only.
    ///
    /// # Errors
    ///
    /// - `CollectionState` while blocked
    /// - `InsufficientFunds` if the balance is lower than `amount`; nothing changes
    pub async fn withdraw(
        &self,
        actor: &Actor,
        id: CollectionId,
        amount: Decimal,
        target: Option<&str>,
    ) -> Result<AccountBalance, LedgerError> {
        let amount = Amount::new(amount)?;
        let target = target.map(AccountNumber::parse).transpose()?;

        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        AccessGuard::ensure(
            AccessGuard::is_collection_owner(parent.as_ref(), &snapshot),
            "only the owner can withdraw from a collection",
        )?;

        let mut collection = Self::lock(&mut tx, &snapshot, &[snapshot.bank_account_id]).await?;
        CollectionStateMachine::check_withdraw(collection.status)?;
        LedgerService::ensure_funds(&mut tx, collection.bank_account_id, amount.value()).await?;

        LedgerService::record_operation(
            &mut tx,
            NewBankOperation {
                source_account_id: Some(collection.bank_account_id),
                destination_account_id: None,
                amount,
                title: format!("Withdrawal: {}", collection.name),
                description: target.map(|t| format!("to {}", t.to_iban())),
            },
        )
        .await?;
        collection.withdrawn_money += amount.value();
        collection.updated_at = Utc::now();
        tx.update_collection(&collection).await?;
        let balance = tx.balance(collection.bank_account_id).await?;
        tx.commit().await?;

        info!(collection_id = %id, %amount, %balance, "collection withdrawal");
        Ok(AccountBalance {
            account_id: collection.bank_account_id,
            balance,
        })
    }

    /// Open → Blocked. Admin only.
    pub async fn block(&self, actor: &Actor, id: CollectionId) -> Result<(), LedgerError> {
        AccessGuard::ensure_admin(actor)?;
        self.set_status(id, CollectionStateMachine::block).await
    }

    /// Blocked → Open. Admin only.
    pub async fn unblock(&self, actor: &Actor, id: CollectionId) -> Result<(), LedgerError> {
        AccessGuard::ensure_admin(actor)?;
        self.set_status(id, CollectionStateMachine::unblock).await
    }

    /// Open → Finished | NotPaidBeforeDeadline. Owner or admin.
    pub async fn finish(
        &self,
        actor: &Actor,
        id: CollectionId,
        outcome: FinishOutcome,
    ) -> Result<(), LedgerError> {
        {
            let mut tx = self.store.begin().await?;
            let parent = AccessGuard::parent_of(&mut tx, actor).await?;
            let collection = Self::find(&mut tx, id).await?;
            let allowed =
                actor.is_admin() || AccessGuard::is_collection_owner(parent.as_ref(), &collection);
            AccessGuard::ensure(allowed, "only the owner or an admin can finish a collection")?;
        }
        self.set_status(id, |status| CollectionStateMachine::finish(status, outcome))
            .await
    }

    /// Edits name, description, deadline or price of an open collection.
    ///
    /// The price is frozen once any payment has been made.
    pub async fn update(
        &self,
        actor: &Actor,
        id: CollectionId,
        changes: UpdateCollection,
    ) -> Result<Collection, LedgerError> {
        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let snapshot = Self::find(&mut tx, id).await?;
        let allowed =
            actor.is_admin() || AccessGuard::is_collection_owner(parent.as_ref(), &snapshot);
        AccessGuard::ensure(allowed, "only the owner or an admin can edit a collection")?;

        let mut collection = Self::lock(&mut tx, &snapshot, &[]).await?;
        CollectionStateMachine::require_open(collection.status, "update")?;

        if let Some(name) = changes.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(LedgerError::Validation("collection name is required".into()));
            }
            collection.name = name;
        }
        if let Some(description) = changes.description {
            collection.description = Some(description);
        }
        if let Some(end) = changes.end_date {
            if end < collection.start_date {
                return Err(LedgerError::Validation(
                    "end date must not precede start date".into(),
                ));
            }
            collection.end_date = Some(end);
        }
        if let Some(price) = changes.price {
            let price = Amount::new(price)?;
            if price != collection.price {
                let rows = tx.collection_operations(id).await?;
                if rows
                    .iter()
                    .any(|row| row.operation_type == CollectionOperationType::Pay)
                {
                    return Err(LedgerError::CollectionState {
                        status: collection.status,
                        action: "change the price of a paid",
                    });
                }
                collection.price = price;
            }
        }
        collection.updated_at = Utc::now();
        tx.update_collection(&collection).await?;
        tx.commit().await?;

        info!(collection_id = %id, "collection updated");
        Ok(collection)
    }

    // ========== Helpers ==========

    async fn set_status<F>(&self, id: CollectionId, next: F) -> Result<(), LedgerError>
    where
        F: FnOnce(CollectionStatus) -> Result<CollectionStatus, LedgerError> + Send,
    {
        let mut tx = self.store.begin().await?;
        let mut collection = tx
            .lock_collection(id)
            .await?
            .ok_or(LedgerError::CollectionNotFound(id))?;
        let from = collection.status;
        collection.status = next(from)?;
        collection.updated_at = Utc::now();
        tx.update_collection(&collection).await?;
        tx.commit().await?;

        info!(collection_id = %id, %from, to = %collection.status, "collection status changed");
        Ok(())
    }

    async fn find(tx: &mut S::Tx, id: CollectionId) -> Result<Collection, LedgerError> {
        tx.find_collection(id)
            .await?
            .ok_or(LedgerError::CollectionNotFound(id))
    }

    async fn viewable(
        tx: &mut S::Tx,
        actor: &Actor,
        id: CollectionId,
    ) -> Result<Collection, LedgerError> {
        let collection = Self::find(tx, id).await?;
        let parent = AccessGuard::parent_of(tx, actor).await?;
        let allowed =
            AccessGuard::can_view_collection(tx, actor, parent.as_ref(), &collection).await?;
        AccessGuard::ensure(allowed, "not allowed to view this collection")?;
        Ok(collection)
    }

    /// Locks `accounts` (ascending) then the collection row, and returns the
    /// locked collection.
    async fn lock(
        tx: &mut S::Tx,
        snapshot: &Collection,
        accounts: &[BankAccountId],
    ) -> Result<Collection, LedgerError> {
        LedgerService::lock_accounts(tx, accounts).await?;
        tx.lock_collection(snapshot.id)
            .await?
            .ok_or(LedgerError::CollectionNotFound(snapshot.id))
    }

    async fn require_child_in_class(
        tx: &mut S::Tx,
        child: ChildId,
        collection: &Collection,
    ) -> Result<Child, LedgerError> {
        let found = tx
            .find_child(child)
            .await?
            .ok_or(LedgerError::ChildNotFound(child))?;
        if found.class_group_id != collection.class_group_id {
            return Err(LedgerError::Validation(format!(
                "child {child} is not in the collection's class"
            )));
        }
        Ok(found)
    }

    async fn require_guardian(
        tx: &mut S::Tx,
        parent: &Parent,
        child: ChildId,
    ) -> Result<(), LedgerError> {
        let guardian = AccessGuard::is_guardian(tx, parent.id, child).await?;
        AccessGuard::ensure(guardian, "not a guardian of this child")
    }

    async fn wallet_of(tx: &mut S::Tx, parent: ParentId) -> Result<BankAccountId, LedgerError> {
        Ok(tx
            .find_parent(parent)
            .await?
            .ok_or(LedgerError::ParentNotFound(parent))?
            .bank_account_id)
    }

    /// Children whose effective row is a payment, ordered by child id.
    fn paid_children(rows: &[CollectionOperation]) -> Vec<PaidChild> {
        let mut paid: Vec<PaidChild> = latest_per_child(rows)
            .into_values()
            .filter(|row| row.operation_type == CollectionOperationType::Pay)
            .map(|row| PaidChild {
                child: row.child_id,
                payer: row.requester_id,
            })
            .collect();
        paid.sort_by_key(|p| p.child);
        paid
    }
}

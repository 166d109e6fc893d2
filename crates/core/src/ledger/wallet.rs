//! Parent wallets: profile registration, deposits, withdrawals and account views.

use std::sync::Arc;

use rust_decimal::Decimal;
use schoolmoney_shared::types::{Amount, BankAccountId, ParentId};
use tracing::info;

use super::error::LedgerError;
use super::service::{AccountFactory, LedgerService};
use super::types::{AccountBalance, BankAccount, BankOperation, NewBankOperation};
use crate::access::{AccessGuard, Actor, Parent, ParentProfile};
use crate::iban::AccountNumber;
use crate::store::{LedgerStore, LedgerTx, StoreError};

/// Request-level ledger operations. Each call is one transaction.
#[derive(Debug)]
pub struct LedgerEngine<S> {
    store: Arc<S>,
    accounts: AccountFactory,
}

impl<S> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            accounts: self.accounts.clone(),
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates the engine.
    #[must_use]
    pub const fn new(store: Arc<S>, accounts: AccountFactory) -> Self {
        Self { store, accounts }
    }

    /// Creates a standalone account. Admin only.
    pub async fn create_account(&self, actor: &Actor) -> Result<BankAccount, LedgerError> {
        AccessGuard::ensure_admin(actor)?;
        let mut tx = self.store.begin().await?;
        let account = self.accounts.create_account(&mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Creates the actor's parent profile together with its wallet account.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the user already has a profile
    /// - `Validation` for blank names
    pub async fn register_parent(
        &self,
        actor: &Actor,
        profile: ParentProfile,
    ) -> Result<Parent, LedgerError> {
        let name = profile.name.trim();
        let surname = profile.surname.trim();
        if name.is_empty() || surname.is_empty() {
            return Err(LedgerError::Validation("name and surname are required".into()));
        }

        let mut tx = self.store.begin().await?;
        if tx.find_parent_by_user(actor.user_id).await?.is_some() {
            return Err(LedgerError::Conflict("parent profile already exists".into()));
        }
        let account = self.accounts.create_account(&mut tx).await?;
        let parent = Parent {
            id: ParentId::new(),
            user_id: actor.user_id,
            name: name.to_string(),
            surname: surname.to_string(),
            bank_account_id: account.id,
        };
        tx.insert_parent(&parent).await.map_err(|e| match e {
            StoreError::Conflict(_) => LedgerError::Conflict("parent profile already exists".into()),
            other => other.into(),
        })?;
        tx.commit().await?;

        info!(parent_id = %parent.id, account_id = %account.id, "parent profile registered");
        Ok(parent)
    }

    /// The actor's own parent profile.
    pub async fn profile(&self, actor: &Actor) -> Result<Parent, LedgerError> {
        let mut tx = self.store.begin().await?;
        AccessGuard::require_parent(&mut tx, actor).await
    }

    /// External deposit into the actor's wallet. Returns the new balance.
    pub async fn deposit(&self, actor: &Actor, amount: Decimal) -> Result<AccountBalance, LedgerError> {
        let amount = Amount::new(amount)?;
        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::require_parent(&mut tx, actor).await?;
        let wallet = parent.bank_account_id;

        LedgerService::lock_accounts(&mut tx, &[wallet]).await?;
        LedgerService::record_operation(
            &mut tx,
            NewBankOperation {
                source_account_id: None,
                destination_account_id: Some(wallet),
                amount,
                title: "Deposit".into(),
                description: None,
            },
        )
        .await?;
        let balance = tx.balance(wallet).await?;
        tx.commit().await?;

        info!(account_id = %wallet, %amount, %balance, "deposit recorded");
        Ok(AccountBalance {
            account_id: wallet,
            balance,
        })
    }

    /// External withdrawal from the actor's wallet. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` if the wallet holds less than `amount`.
    pub async fn withdraw(
        &self,
        actor: &Actor,
        amount: Decimal,
        target: Option<&str>,
    ) -> Result<AccountBalance, LedgerError> {
        let amount = Amount::new(amount)?;
        let target = target.map(AccountNumber::parse).transpose()?;

        let mut tx = self.store.begin().await?;
        let parent = AccessGuard::require_parent(&mut tx, actor).await?;
        let wallet = parent.bank_account_id;

        LedgerService::lock_accounts(&mut tx, &[wallet]).await?;
        LedgerService::ensure_funds(&mut tx, wallet, amount.value()).await?;
        LedgerService::record_operation(
            &mut tx,
            NewBankOperation {
                source_account_id: Some(wallet),
                destination_account_id: None,
                amount,
                title: "Withdrawal".into(),
                description: target.map(|t| format!("to {}", t.to_iban())),
            },
        )
        .await?;
        let balance = tx.balance(wallet).await?;
        tx.commit().await?;

        info!(account_id = %wallet, %amount, %balance, "withdrawal recorded");
        Ok(AccountBalance {
            account_id: wallet,
            balance,
        })
    }

    /// Balance of an account: the owner's wallet or any account for admins.
    pub async fn balance(
        &self,
        actor: &Actor,
        account: BankAccountId,
    ) -> Result<AccountBalance, LedgerError> {
        let mut tx = self.store.begin().await?;
        Self::ensure_account_access(&mut tx, actor, account).await?;
        let balance = LedgerService::get_balance(&mut tx, account).await?;
        Ok(AccountBalance {
            account_id: account,
            balance,
        })
    }

    /// Operation log of an account: the owner's wallet or any account for admins.
    pub async fn view_operations(
        &self,
        actor: &Actor,
        account: BankAccountId,
    ) -> Result<Vec<BankOperation>, LedgerError> {
        let mut tx = self.store.begin().await?;
        Self::ensure_account_access(&mut tx, actor, account).await?;
        LedgerService::operations(&mut tx, account).await
    }

    /// Locks or unlocks an account. Admin only.
    pub async fn set_account_lock(
        &self,
        actor: &Actor,
        account: BankAccountId,
        locked: bool,
    ) -> Result<BankAccount, LedgerError> {
        AccessGuard::ensure_admin(actor)?;
        let mut tx = self.store.begin().await?;
        let mut found = LedgerService::lock_accounts(&mut tx, &[account])
            .await?
            .pop()
            .ok_or(LedgerError::AccountNotFound(account))?;
        found.is_locked = locked;
        tx.set_account_lock(account, locked).await?;
        tx.commit().await?;

        info!(account_id = %account, locked, "account lock changed");
        Ok(found)
    }

    async fn ensure_account_access(
        tx: &mut S::Tx,
        actor: &Actor,
        account: BankAccountId,
    ) -> Result<(), LedgerError> {
        if actor.is_admin() {
            return Ok(());
        }
        let own = AccessGuard::parent_of(tx, actor)
            .await?
            .is_some_and(|p| p.bank_account_id == account);
        AccessGuard::ensure(own, "not your account")
    }
}

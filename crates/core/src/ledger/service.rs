//! Transaction-scoped ledger primitives.
//!
//! These functions run inside a caller-owned `LedgerTx`; they never commit.
//! Funds checks belong to the callers, never to `record_operation`.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use schoolmoney_shared::types::{Amount, BankAccountId};
use tracing::{debug, warn};

use super::error::LedgerError;
use super::types::{BankAccount, BankOperation, NewBankOperation};
use crate::iban::AccountNumberSource;
use crate::store::LedgerTx;

/// Creates bank accounts with unique numbers.
#[derive(Clone)]
pub struct AccountFactory {
    numbers: Arc<dyn AccountNumberSource>,
    attempts: u32,
}

impl std::fmt::Debug for AccountFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountFactory")
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl AccountFactory {
    /// Creates a factory that tries at most `attempts` numbers per account.
    #[must_use]
    pub fn new(numbers: Arc<dyn AccountNumberSource>, attempts: u32) -> Self {
        Self {
            numbers,
            attempts: attempts.max(1),
        }
    }

    /// Inserts a new account, regenerating the number on collisions.
    ///
    /// # Errors
    ///
    /// - `AccountNumbersExhausted` if every attempt collided
    /// - `Store` for any other storage failure, without retrying
    pub async fn create_account<T: LedgerTx>(&self, tx: &mut T) -> Result<BankAccount, LedgerError> {
        for attempt in 1..=self.attempts {
            let account = BankAccount {
                id: BankAccountId::new(),
                account_number: self.numbers.next_number()?,
                is_locked: false,
                created_at: Utc::now(),
            };
            match tx.insert_account(&account).await {
                Ok(()) => {
                    debug!(account_id = %account.id, attempt, "bank account created");
                    return Ok(account);
                }
                Err(err) if err.is_conflict() => {
                    warn!(attempt, number = %account.account_number, "account number collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LedgerError::AccountNumbersExhausted(self.attempts))
    }
}

/// Stateless ledger operations over an open transaction.
pub struct LedgerService;

impl LedgerService {
    /// Checks the shape of an operation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if neither side is set, both sides are the same
    /// account, or the title is blank.
    pub fn validate_operation(op: &NewBankOperation) -> Result<(), LedgerError> {
        match (op.source_account_id, op.destination_account_id) {
            (None, None) => {
                return Err(LedgerError::Validation(
                    "operation needs a source or a destination account".into(),
                ));
            }
            (Some(source), Some(destination)) if source == destination => {
                return Err(LedgerError::Validation(
                    "source and destination accounts must differ".into(),
                ));
            }
            _ => {}
        }
        if op.title.trim().is_empty() {
            return Err(LedgerError::Validation("operation title is required".into()));
        }
        Ok(())
    }

    /// Validates and appends one immutable ledger row.
    ///
    /// Both sides must exist and be unlocked. Funds are not checked.
    pub async fn record_operation<T: LedgerTx>(
        tx: &mut T,
        op: NewBankOperation,
    ) -> Result<BankOperation, LedgerError> {
        Self::validate_operation(&op)?;
        for side in [op.source_account_id, op.destination_account_id]
            .into_iter()
            .flatten()
        {
            let account = tx
                .find_account(side)
                .await?
                .ok_or(LedgerError::AccountNotFound(side))?;
            if account.is_locked {
                return Err(LedgerError::AccountLocked(side));
            }
        }
        let row = tx.insert_operation(&op, Utc::now()).await?;
        debug!(
            operation_id = %row.id,
            amount = %row.amount,
            source = ?row.source_account_id,
            destination = ?row.destination_account_id,
            "ledger operation recorded"
        );
        Ok(row)
    }

    /// Convenience wrapper building a transfer between two internal accounts.
    pub async fn transfer<T: LedgerTx>(
        tx: &mut T,
        source: BankAccountId,
        destination: BankAccountId,
        amount: Amount,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<BankOperation, LedgerError> {
        Self::record_operation(
            tx,
            NewBankOperation {
                source_account_id: Some(source),
                destination_account_id: Some(destination),
                amount,
                title: title.into(),
                description,
            },
        )
        .await
    }

    /// Derived balance of an existing account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` for unknown accounts.
    pub async fn get_balance<T: LedgerTx>(
        tx: &mut T,
        account: BankAccountId,
    ) -> Result<Decimal, LedgerError> {
        if tx.find_account(account).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account));
        }
        Ok(tx.balance(account).await?)
    }

    /// Fails with `InsufficientFunds` unless `account` holds at least `required`.
    pub async fn ensure_funds<T: LedgerTx>(
        tx: &mut T,
        account: BankAccountId,
        required: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let available = tx.balance(account).await?;
        if available < required {
            return Err(LedgerError::InsufficientFunds {
                account,
                required,
                available,
            });
        }
        Ok(available)
    }

    /// Locks accounts in ascending id order, the single global lock order.
    ///
    /// Duplicates are locked once. Returns the accounts in lock order.
    pub async fn lock_accounts<T: LedgerTx>(
        tx: &mut T,
        ids: &[BankAccountId],
    ) -> Result<Vec<BankAccount>, LedgerError> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut locked = Vec::with_capacity(ordered.len());
        for id in ordered {
            let account = tx
                .lock_account(id)
                .await?
                .ok_or(LedgerError::AccountNotFound(id))?;
            locked.push(account);
        }
        Ok(locked)
    }

    /// Operation log of an account ordered by id.
    pub async fn operations<T: LedgerTx>(
        tx: &mut T,
        account: BankAccountId,
    ) -> Result<Vec<BankOperation>, LedgerError> {
        if tx.find_account(account).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account));
        }
        Ok(tx.account_operations(account).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iban::{AccountNumber, IbanError, IbanGenerator};
    use crate::store::{LedgerStore, MemoryStore, StoreError};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Replays a fixed list of numbers, then falls back to random ones.
    struct Scripted {
        queue: Mutex<Vec<AccountNumber>>,
    }

    impl Scripted {
        fn new(mut numbers: Vec<AccountNumber>) -> Self {
            numbers.reverse();
            Self {
                queue: Mutex::new(numbers),
            }
        }
    }

    impl AccountNumberSource for Scripted {
        fn next_number(&self) -> Result<AccountNumber, IbanError> {
            match self.queue.lock().unwrap().pop() {
                Some(number) => Ok(number),
                None => IbanGenerator::new(false).generate(),
            }
        }
    }

    fn fixed_number() -> AccountNumber {
        AccountNumber::parse("61109010140000071219812874").unwrap()
    }

    fn op(
        source: Option<BankAccountId>,
        destination: Option<BankAccountId>,
        amount: Decimal,
    ) -> NewBankOperation {
        NewBankOperation {
            source_account_id: source,
            destination_account_id: destination,
            amount: Amount::new(amount).unwrap(),
            title: "test".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_collision_is_retried() {
        let store = MemoryStore::new();
        let factory = AccountFactory::new(
            Arc::new(Scripted::new(vec![fixed_number(), fixed_number(), fixed_number()])),
            8,
        );

        let mut tx = store.begin().await.unwrap();
        let first = factory.create_account(&mut tx).await.unwrap();
        let second = factory.create_account(&mut tx).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.account_number, fixed_number());
        assert_ne!(second.account_number, fixed_number());
        assert_eq!(store.account_count().await, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_conflict() {
        let store = MemoryStore::new();
        let factory = AccountFactory::new(Arc::new(Scripted::new(vec![fixed_number(); 4])), 3);

        let mut tx = store.begin().await.unwrap();
        factory.create_account(&mut tx).await.unwrap();
        let err = factory.create_account(&mut tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNumbersExhausted(3)));
        assert_eq!(err.http_status_code(), 409);
    }

    #[tokio::test]
    async fn test_non_conflict_failure_is_not_retried() {
        struct Broken;
        impl AccountNumberSource for Broken {
            fn next_number(&self) -> Result<AccountNumber, IbanError> {
                Err(IbanError::Exhausted(16))
            }
        }
        let store = MemoryStore::new();
        let factory = AccountFactory::new(Arc::new(Broken), 8);
        let mut tx = store.begin().await.unwrap();
        let err = factory.create_account(&mut tx).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAccountNumber(IbanError::Exhausted(16))));
    }

    #[tokio::test]
    async fn test_ten_thousand_accounts_are_unique() {
        let store = MemoryStore::new();
        let factory = AccountFactory::new(Arc::new(IbanGenerator::new(true)), 8);

        let mut tx = store.begin().await.unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let account = factory.create_account(&mut tx).await.unwrap();
            assert!(seen.insert(account.account_number));
        }
        tx.commit().await.unwrap();
        assert_eq!(store.account_count().await, 10_000);
    }

    #[test]
    fn test_validate_operation_shapes() {
        let a = BankAccountId::new();
        let b = BankAccountId::new();
        assert!(LedgerService::validate_operation(&op(None, Some(a), dec!(1))).is_ok());
        assert!(LedgerService::validate_operation(&op(Some(a), None, dec!(1))).is_ok());
        assert!(LedgerService::validate_operation(&op(Some(a), Some(b), dec!(1))).is_ok());
        assert!(matches!(
            LedgerService::validate_operation(&op(None, None, dec!(1))),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            LedgerService::validate_operation(&op(Some(a), Some(a), dec!(1))),
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_record_operation_does_not_check_funds() {
        let store = MemoryStore::new();
        let factory = AccountFactory::new(Arc::new(IbanGenerator::default()), 8);
        let mut tx = store.begin().await.unwrap();
        let a = factory.create_account(&mut tx).await.unwrap();

        LedgerService::record_operation(&mut tx, op(Some(a.id), None, dec!(40)))
            .await
            .unwrap();
        assert_eq!(LedgerService::get_balance(&mut tx, a.id).await.unwrap(), dec!(-40));

        let err = LedgerService::ensure_funds(&mut tx, a.id, dec!(1)).await.unwrap_err();
        assert_eq!(err.http_status_code(), 422);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let ghost = BankAccountId::new();

        let err = LedgerService::record_operation(&mut tx, op(None, Some(ghost), dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(id) if id == ghost));
        assert!(matches!(
            LedgerService::get_balance(&mut tx, ghost).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_accounts_sorted_and_deduplicated() {
        let store = MemoryStore::new();
        let factory = AccountFactory::new(Arc::new(IbanGenerator::default()), 8);
        let mut tx = store.begin().await.unwrap();
        let a = factory.create_account(&mut tx).await.unwrap();
        let b = factory.create_account(&mut tx).await.unwrap();

        let locked = LedgerService::lock_accounts(&mut tx, &[b.id, a.id, b.id])
            .await
            .unwrap();
        let ids: Vec<_> = locked.iter().map(|acc| acc.id).collect();
        let mut expected = vec![a.id, b.id];
        expected.sort_unstable();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err: LedgerError = StoreError::Conflict("dup".into()).into();
        assert_eq!(err.http_status_code(), 409);
    }
}

//! PostgreSQL integration tests for `DbStore`.
//!
//! Skipped when `DATABASE_URL` (or `SCHOOLMONEY__DATABASE__URL`) does not
//! point at a reachable database.

#![allow(clippy::uninlined_format_args)]

use std::env;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm_migration::MigratorTrait;

use schoolmoney_core::access::{Actor, DirectoryService, NewChild, ParentProfile};
use schoolmoney_core::collection::{
    Collection, CollectionEngine, CollectionOperation, CollectionOperationType, CollectionStatus,
    CreateCollection,
};
use schoolmoney_core::error::ErrorKind;
use schoolmoney_core::iban::{AccountNumber, IbanGenerator};
use schoolmoney_core::ledger::{AccountFactory, BankAccount, LedgerEngine};
use schoolmoney_core::store::{LedgerStore, LedgerTx, StoreError};
use schoolmoney_db::{DbStore, connect, migration::Migrator};
use schoolmoney_shared::types::{BankAccountId, ChildId, UserId};

fn get_database_url() -> Option<String> {
    env::var("DATABASE_URL")
        .or_else(|_| env::var("SCHOOLMONEY__DATABASE__URL"))
        .ok()
}

async fn store() -> Option<Arc<DbStore>> {
    let url = get_database_url()?;
    let db = match connect(&url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Skipping test - database not available: {}", e);
            return None;
        }
    };
    if let Err(e) = Migrator::up(&db, None).await {
        eprintln!("Skipping test - migration failed: {}", e);
        return None;
    }
    Some(Arc::new(DbStore::new(db)))
}

fn factory() -> AccountFactory {
    AccountFactory::new(Arc::new(IbanGenerator::default()), 8)
}

fn account(number: &AccountNumber) -> BankAccount {
    BankAccount {
        id: BankAccountId::new(),
        account_number: number.clone(),
        is_locked: false,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_duplicate_account_number_keeps_transaction_usable() {
    let Some(store) = store().await else { return };
    let number = IbanGenerator::new(false).generate().unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.insert_account(&account(&number)).await.unwrap();
    let err = tx.insert_account(&account(&number)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // The savepoint rolled back only the failed insert.
    let found = tx.find_account_by_number(&number).await.unwrap();
    assert!(found.is_some());
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let Some(store) = store().await else { return };
    let number = IbanGenerator::new(false).generate().unwrap();

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&account(&number)).await.unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    assert!(tx.find_account_by_number(&number).await.unwrap().is_none());
}

#[tokio::test]
async fn test_wallet_balance_is_derived_from_operations() {
    let Some(store) = store().await else { return };
    let ledger = LedgerEngine::new(Arc::clone(&store), factory());
    let actor = Actor::standard(UserId::new());
    let parent = ledger
        .register_parent(
            &actor,
            ParentProfile {
                name: "Olga".into(),
                surname: "Nowak".into(),
            },
        )
        .await
        .unwrap();

    ledger.deposit(&actor, dec!(100.10)).await.unwrap();
    ledger.deposit(&actor, dec!(0.20)).await.unwrap();
    let after = ledger.withdraw(&actor, dec!(50.05), None).await.unwrap();
    assert_eq!(after.balance, dec!(50.25));

    let err = ledger.withdraw(&actor, dec!(1000), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let ops = ledger
        .view_operations(&actor, parent.bank_account_id)
        .await
        .unwrap();
    assert_eq!(ops.len(), 3);

    let err = ledger
        .register_parent(
            &actor,
            ParentProfile {
                name: "Olga".into(),
                surname: "Nowak".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_collection_lifecycle_on_postgres() {
    let Some(store) = store().await else { return };
    let ledger = LedgerEngine::new(Arc::clone(&store), factory());
    let directory = DirectoryService::new(Arc::clone(&store));
    let collections = CollectionEngine::new(Arc::clone(&store), factory());
    let admin = Actor::admin(UserId::new());

    let owner = Actor::standard(UserId::new());
    ledger
        .register_parent(&owner, ParentProfile { name: "Olga".into(), surname: "K".into() })
        .await
        .unwrap();
    let class = directory
        .create_class_group(&owner, &format!("class-{}", UserId::new()), None)
        .await
        .unwrap();

    let payer = Actor::standard(UserId::new());
    let payer_parent = ledger
        .register_parent(&payer, ParentProfile { name: "Piotr".into(), surname: "K".into() })
        .await
        .unwrap();
    let child = directory
        .register_child(
            &admin,
            NewChild {
                name: "Ada".into(),
                surname: "K".into(),
                class_group_id: class.id,
                parent_id: payer_parent.id,
            },
        )
        .await
        .unwrap();
    ledger.deposit(&payer, dec!(300)).await.unwrap();

    let collection = collections
        .create(
            &owner,
            CreateCollection {
                name: "Trip".into(),
                description: None,
                start_date: None,
                end_date: None,
                price: dec!(100),
                class_group_id: class.id,
            },
        )
        .await
        .unwrap();

    collections.pay(&payer, collection.id, child.id).await.unwrap();
    collections.refund(&owner, collection.id, child.id).await.unwrap();
    collections.pay(&payer, collection.id, child.id).await.unwrap();

    let rows = collections.operations(&owner, collection.id).await.unwrap();
    assert_eq!(rows.len(), 3);

    collections.cancel(&owner, collection.id).await.unwrap();
    let cancelled = collections.get(&owner, collection.id).await.unwrap();
    assert_eq!(cancelled.status, CollectionStatus::Cancelled);

    let wallet = ledger.balance(&payer, payer_parent.bank_account_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(300));
}

#[tokio::test]
async fn test_concurrent_deposits_keep_exact_balance() {
    let Some(store) = store().await else { return };
    let ledger = LedgerEngine::new(Arc::clone(&store), factory());
    let actor = Actor::standard(UserId::new());
    let parent = ledger
        .register_parent(&actor, ParentProfile { name: "Olga".into(), surname: "K".into() })
        .await
        .unwrap();

    let tasks = (0..50).map(|_| {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.deposit(&actor, dec!(0.01)).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let balance = ledger.balance(&actor, parent.bank_account_id).await.unwrap();
    assert_eq!(balance.balance, dec!(0.50));
}

/// A collection of 100 in a fresh class with two paid-up children.
struct PaidCollection {
    store: Arc<DbStore>,
    collections: CollectionEngine<DbStore>,
    admin: Actor,
    owner: Actor,
    collection: Collection,
    children: [ChildId; 2],
    wallets: [BankAccountId; 2],
}

impl PaidCollection {
    async fn new(store: Arc<DbStore>) -> Self {
        let ledger = LedgerEngine::new(Arc::clone(&store), factory());
        let directory = DirectoryService::new(Arc::clone(&store));
        let collections = CollectionEngine::new(Arc::clone(&store), factory());
        let admin = Actor::admin(UserId::new());

        let owner = Actor::standard(UserId::new());
        ledger
            .register_parent(&owner, ParentProfile { name: "Olga".into(), surname: "K".into() })
            .await
            .unwrap();
        let class = directory
            .create_class_group(&owner, &format!("class-{}", UserId::new()), None)
            .await
            .unwrap();
        let collection = collections
            .create(
                &owner,
                CreateCollection {
                    name: "Trip".into(),
                    description: None,
                    start_date: None,
                    end_date: None,
                    price: dec!(100),
                    class_group_id: class.id,
                },
            )
            .await
            .unwrap();

        let mut children = [ChildId::new(); 2];
        let mut wallets = [BankAccountId::new(); 2];
        for (i, name) in ["Ada", "Bolek"].into_iter().enumerate() {
            let payer = Actor::standard(UserId::new());
            let parent = ledger
                .register_parent(&payer, ParentProfile { name: name.into(), surname: "K".into() })
                .await
                .unwrap();
            let child = directory
                .register_child(
                    &admin,
                    NewChild {
                        name: name.into(),
                        surname: "K".into(),
                        class_group_id: class.id,
                        parent_id: parent.id,
                    },
                )
                .await
                .unwrap();
            ledger.deposit(&payer, dec!(300)).await.unwrap();
            collections.pay(&payer, collection.id, child.id).await.unwrap();
            children[i] = child.id;
            wallets[i] = parent.bank_account_id;
        }

        Self { store, collections, admin, owner, collection, children, wallets }
    }

    async fn balance(&self, account: BankAccountId) -> Decimal {
        let mut tx = self.store.begin().await.unwrap();
        tx.balance(account).await.unwrap()
    }

    async fn refund_rows(&self, child: ChildId) -> usize {
        let rows: Vec<CollectionOperation> =
            self.collections.operations(&self.owner, self.collection.id).await.unwrap();
        rows.iter()
            .filter(|row| row.child_id == child && row.operation_type == CollectionOperationType::Refund)
            .count()
    }
}

#[tokio::test]
async fn test_concurrent_refunds_on_postgres_pay_back_once() {
    let Some(store) = store().await else { return };
    let paid = PaidCollection::new(store).await;
    let (c, child) = (paid.collection.id, paid.children[0]);

    let tasks = [paid.owner, paid.admin].into_iter().map(|actor| {
        let engine = paid.collections.clone();
        tokio::spawn(async move { engine.refund(&actor, c, child).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(paid.refund_rows(child).await, 1);
    assert_eq!(paid.balance(paid.wallets[0]).await, dec!(300));
    assert_eq!(paid.balance(paid.collection.bank_account_id).await, dec!(100));
}

#[tokio::test]
async fn test_refund_racing_cancel_on_postgres_keeps_account_solvent() {
    let Some(store) = store().await else { return };
    let paid = PaidCollection::new(store).await;
    let c = paid.collection.id;

    let refund = {
        let engine = paid.collections.clone();
        let (actor, child) = (paid.owner, paid.children[0]);
        tokio::spawn(async move { engine.refund(&actor, c, child).await })
    };
    let cancel = {
        let engine = paid.collections.clone();
        let actor = paid.admin;
        tokio::spawn(async move { engine.cancel(&actor, c).await })
    };
    let refunded = refund.await.unwrap();
    cancel.await.unwrap().unwrap();

    if let Err(err) = refunded {
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
    for (child, wallet) in paid.children.into_iter().zip(paid.wallets) {
        assert_eq!(paid.refund_rows(child).await, 1);
        assert_eq!(paid.balance(wallet).await, dec!(300));
    }
    let left = paid.balance(paid.collection.bank_account_id).await;
    assert!(left >= Decimal::ZERO);
    assert_eq!(left, dec!(0));
}

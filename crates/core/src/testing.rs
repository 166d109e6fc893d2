//! Shared fixtures for engine tests.

use std::sync::Arc;

use rust_decimal::Decimal;
use schoolmoney_shared::types::{BankAccountId, ClassGroupId, UserId};

use crate::access::{Actor, Child, ClassGroup, DirectoryService, NewChild, Parent, ParentProfile};
use crate::collection::{Collection, CollectionEngine, CreateCollection};
use crate::iban::IbanGenerator;
use crate::ledger::{AccountFactory, LedgerEngine};
use crate::reports::ReportEngine;
use crate::store::{LedgerStore, LedgerTx, MemoryStore};

/// Every engine over one in-process store.
pub(crate) struct World {
    pub store: Arc<MemoryStore>,
    pub ledger: LedgerEngine<MemoryStore>,
    pub directory: DirectoryService<MemoryStore>,
    pub collections: CollectionEngine<MemoryStore>,
    pub reports: ReportEngine<MemoryStore>,
    pub admin: Actor,
}

impl World {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let accounts = AccountFactory::new(Arc::new(IbanGenerator::new(false)), 8);
        Self {
            ledger: LedgerEngine::new(Arc::clone(&store), accounts.clone()),
            directory: DirectoryService::new(Arc::clone(&store)),
            collections: CollectionEngine::new(Arc::clone(&store), accounts),
            reports: ReportEngine::new(Arc::clone(&store)),
            admin: Actor::admin(UserId::new()),
            store,
        }
    }

    /// A fresh user with a parent profile.
    pub async fn parent(&self, name: &str) -> (Actor, Parent) {
        let actor = Actor::standard(UserId::new());
        let parent = self
            .ledger
            .register_parent(
                &actor,
                ParentProfile {
                    name: name.to_string(),
                    surname: "Test".to_string(),
                },
            )
            .await
            .unwrap();
        (actor, parent)
    }

    /// A class group whose cashier is `cashier`.
    pub async fn class(&self, cashier: &Actor, name: &str) -> ClassGroup {
        self.directory
            .create_class_group(cashier, name, None)
            .await
            .unwrap()
    }

    /// A child in `class` guarded by `parent`.
    pub async fn child(&self, class: ClassGroupId, parent: &Parent, name: &str) -> Child {
        self.directory
            .register_child(
                &self.admin,
                NewChild {
                    name: name.to_string(),
                    surname: "Test".to_string(),
                    class_group_id: class,
                    parent_id: parent.id,
                },
            )
            .await
            .unwrap()
    }

    pub async fn fund(&self, actor: &Actor, amount: Decimal) {
        self.ledger.deposit(actor, amount).await.unwrap();
    }

    pub async fn collection(&self, owner: &Actor, class: ClassGroupId, price: Decimal) -> Collection {
        self.collections
            .create(
                owner,
                CreateCollection {
                    name: "School trip".to_string(),
                    description: None,
                    start_date: None,
                    end_date: None,
                    price,
                    class_group_id: class,
                },
            )
            .await
            .unwrap()
    }

    /// Committed balance, read around every guard.
    pub async fn balance(&self, account: BankAccountId) -> Decimal {
        let mut tx = self.store.begin().await.unwrap();
        tx.balance(account).await.unwrap()
    }

    pub async fn reload(&self, collection: &Collection) -> Collection {
        self.collections.get(&self.admin, collection.id).await.unwrap()
    }
}

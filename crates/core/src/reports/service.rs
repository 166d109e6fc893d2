//! Report generation.
//!
//! `ReportService` holds the pure arithmetic; `ReportEngine` loads the data
//! inside one read transaction and applies the viewer guard.

use std::sync::Arc;

use rust_decimal::Decimal;
use schoolmoney_shared::types::{ClassGroupId, CollectionId};

use super::types::{
    ChildParticipation, ChildrenFinancialStatus, ClassFinancialReport, CollectionFinancialReport,
    ReportTotals,
};
use crate::access::{AccessGuard, Actor, Child};
use crate::collection::{Collection, CollectionOperation, ParticipationStatus, participation_of};
use crate::ledger::LedgerError;
use crate::store::{LedgerStore, LedgerTx};

/// Pure report builders.
pub struct ReportService;

impl ReportService {
    /// Splits `children` by their effective participation in `rows`.
    #[must_use]
    pub fn children_status(
        children: Vec<Child>,
        rows: &[CollectionOperation],
    ) -> ChildrenFinancialStatus {
        let mut report = ChildrenFinancialStatus::default();
        for child in children {
            let status = participation_of(rows, child.id);
            let entry = ChildParticipation { child, status };
            match status {
                ParticipationStatus::Paid => report.paid.push(entry),
                ParticipationStatus::Unpaid => report.unpaid.push(entry),
                ParticipationStatus::Discharged | ParticipationStatus::Refunded => {
                    report.excluded.push(entry);
                }
            }
        }
        report
    }

    /// Builds the money summary of one collection.
    #[must_use]
    pub fn collection_report(
        collection: &Collection,
        status: &ChildrenFinancialStatus,
        ledger_balance: Decimal,
    ) -> CollectionFinancialReport {
        let price = collection.price;
        let paid_count = status.paid.len();
        let unpaid_count = status.unpaid.len();
        let excluded_count = status.excluded.len();

        let expected = price.times((paid_count + unpaid_count) as u64);
        let collected = price.times(paid_count as u64);
        let withdrawn = collection.withdrawn_money;

        CollectionFinancialReport {
            collection_id: collection.id,
            name: collection.name.clone(),
            status: collection.status,
            bank_account_id: collection.bank_account_id,
            price,
            total_children: paid_count + unpaid_count + excluded_count,
            paid_count,
            unpaid_count,
            excluded_count,
            expected,
            collected,
            outstanding: expected - collected,
            withdrawn,
            available: (collected - withdrawn).max(Decimal::ZERO),
            ledger_balance,
        }
    }

    /// Sums per-collection summaries.
    #[must_use]
    pub fn totals(reports: &[CollectionFinancialReport]) -> ReportTotals {
        reports.iter().fold(ReportTotals::default(), |mut acc, r| {
            acc.expected += r.expected;
            acc.collected += r.collected;
            acc.outstanding += r.outstanding;
            acc.withdrawn += r.withdrawn;
            acc.available += r.available;
            acc.ledger_balance += r.ledger_balance;
            acc
        })
    }
}

/// Store-backed reports. Viewers only.
#[derive(Debug)]
pub struct ReportEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for ReportEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> ReportEngine<S> {
    /// Creates the engine.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Children of the collection's class grouped as paid, unpaid and excluded.
    pub async fn children_financial_status(
        &self,
        actor: &Actor,
        id: CollectionId,
    ) -> Result<ChildrenFinancialStatus, LedgerError> {
        let mut tx = self.store.begin().await?;
        let collection = Self::viewable(&mut tx, actor, id).await?;
        Self::status_of(&mut tx, &collection).await
    }

    /// Money summary of one collection.
    pub async fn financial_report(
        &self,
        actor: &Actor,
        id: CollectionId,
    ) -> Result<CollectionFinancialReport, LedgerError> {
        let mut tx = self.store.begin().await?;
        let collection = Self::viewable(&mut tx, actor, id).await?;
        Self::report_of(&mut tx, &collection).await
    }

    /// Summaries of every collection in a class, with totals.
    pub async fn class_financial_report(
        &self,
        actor: &Actor,
        class: ClassGroupId,
    ) -> Result<ClassFinancialReport, LedgerError> {
        let mut tx = self.store.begin().await?;
        tx.find_class_group(class)
            .await?
            .ok_or(LedgerError::ClassGroupNotFound(class))?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let allowed = AccessGuard::can_view_class(&mut tx, actor, parent.as_ref(), class).await?;
        AccessGuard::ensure(allowed, "not a member of this class group")?;

        let mut collections = Vec::new();
        for collection in tx.class_collections(class).await? {
            collections.push(Self::report_of(&mut tx, &collection).await?);
        }
        let totals = ReportService::totals(&collections);
        Ok(ClassFinancialReport {
            class_group_id: class,
            collections,
            totals,
        })
    }

    async fn viewable(
        tx: &mut S::Tx,
        actor: &Actor,
        id: CollectionId,
    ) -> Result<Collection, LedgerError> {
        let collection = tx
            .find_collection(id)
            .await?
            .ok_or(LedgerError::CollectionNotFound(id))?;
        let parent = AccessGuard::parent_of(tx, actor).await?;
        let allowed =
            AccessGuard::can_view_collection(tx, actor, parent.as_ref(), &collection).await?;
        AccessGuard::ensure(allowed, "not allowed to view this collection")?;
        Ok(collection)
    }

    async fn status_of(
        tx: &mut S::Tx,
        collection: &Collection,
    ) -> Result<ChildrenFinancialStatus, LedgerError> {
        let children = tx.children_in_class(collection.class_group_id).await?;
        let rows = tx.collection_operations(collection.id).await?;
        Ok(ReportService::children_status(children, &rows))
    }

    async fn report_of(
        tx: &mut S::Tx,
        collection: &Collection,
    ) -> Result<CollectionFinancialReport, LedgerError> {
        let status = Self::status_of(tx, collection).await?;
        let balance = tx.balance(collection.bank_account_id).await?;
        Ok(ReportService::collection_report(collection, &status, balance))
    }
}

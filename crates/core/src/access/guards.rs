//! Ownership and role checks.
//!
//! Guards only read. Every engine call evaluates them before its first write,
//! so a failed guard never leaves partial state.

use schoolmoney_shared::types::{ChildId, ClassGroupId, ParentId};

use super::types::{Actor, Parent, ParentRole};
use crate::collection::types::Collection;
use crate::ledger::LedgerError;
use crate::store::LedgerTx;

/// Stateless access checks over an open transaction.
pub struct AccessGuard;

impl AccessGuard {
    /// The actor's parent profile, if they have one.
    pub async fn parent_of<T: LedgerTx>(
        tx: &mut T,
        actor: &Actor,
    ) -> Result<Option<Parent>, LedgerError> {
        Ok(tx.find_parent_by_user(actor.user_id).await?)
    }

    /// The actor's parent profile.
    ///
    /// # Errors
    ///
    /// Returns `ProfileNotFound` if the user has not registered as a parent.
    pub async fn require_parent<T: LedgerTx>(
        tx: &mut T,
        actor: &Actor,
    ) -> Result<Parent, LedgerError> {
        Self::parent_of(tx, actor)
            .await?
            .ok_or(LedgerError::ProfileNotFound(actor.user_id))
    }

    /// True if `parent` created `collection`.
    #[must_use]
    pub fn is_collection_owner(parent: Option<&Parent>, collection: &Collection) -> bool {
        parent.is_some_and(|p| p.id == collection.owner_id)
    }

    /// True if `parent` is the cashier of `class`.
    pub async fn is_cashier<T: LedgerTx>(
        tx: &mut T,
        parent: ParentId,
        class: ClassGroupId,
    ) -> Result<bool, LedgerError> {
        Ok(tx.group_role(class, parent).await? == Some(ParentRole::Cashier))
    }

    /// True if `parent` is a guardian of `child`.
    pub async fn is_guardian<T: LedgerTx>(
        tx: &mut T,
        parent: ParentId,
        child: ChildId,
    ) -> Result<bool, LedgerError> {
        Ok(tx.is_guardian(parent, child).await?)
    }

    /// Admins, members of the collection's class and guardians of a child in
    /// that class may view a collection.
    pub async fn can_view_collection<T: LedgerTx>(
        tx: &mut T,
        actor: &Actor,
        parent: Option<&Parent>,
        collection: &Collection,
    ) -> Result<bool, LedgerError> {
        if actor.is_admin() {
            return Ok(true);
        }
        let Some(parent) = parent else {
            return Ok(false);
        };
        if parent.id == collection.owner_id
            || tx
                .group_role(collection.class_group_id, parent.id)
                .await?
                .is_some()
        {
            return Ok(true);
        }
        Ok(tx
            .has_child_in_class(parent.id, collection.class_group_id)
            .await?)
    }

    /// Same rule as `can_view_collection`, applied to a whole class.
    pub async fn can_view_class<T: LedgerTx>(
        tx: &mut T,
        actor: &Actor,
        parent: Option<&Parent>,
        class: ClassGroupId,
    ) -> Result<bool, LedgerError> {
        if actor.is_admin() {
            return Ok(true);
        }
        let Some(parent) = parent else {
            return Ok(false);
        };
        if tx.group_role(class, parent.id).await?.is_some() {
            return Ok(true);
        }
        Ok(tx.has_child_in_class(parent.id, class).await?)
    }

    /// Owner, class cashier or admin: who may move a collection's money back.
    pub async fn can_manage_money<T: LedgerTx>(
        tx: &mut T,
        actor: &Actor,
        parent: Option<&Parent>,
        collection: &Collection,
    ) -> Result<bool, LedgerError> {
        if actor.is_admin() || Self::is_collection_owner(parent, collection) {
            return Ok(true);
        }
        match parent {
            Some(p) => Self::is_cashier(tx, p.id, collection.class_group_id).await,
            None => Ok(false),
        }
    }

    /// Turns a failed check into `PermissionDenied`.
    pub fn ensure(allowed: bool, msg: &str) -> Result<(), LedgerError> {
        if allowed {
            Ok(())
        } else {
            Err(LedgerError::denied(msg))
        }
    }

    /// Fails unless the actor is an administrator.
    pub fn ensure_admin(actor: &Actor) -> Result<(), LedgerError> {
        Self::ensure(actor.is_admin(), "administrator privilege required")
    }
}

//! Class-group membership operations that change who may act on money.

use std::sync::Arc;

use schoolmoney_shared::types::{ChildId, ClassGroupId, ParentId};
use tracing::info;

use super::guards::AccessGuard;
use super::types::{Actor, Child, ClassGroup, NewChild, ParentRole};
use crate::ledger::LedgerError;
use crate::store::{LedgerStore, LedgerTx, StoreError};

/// Class groups, children and cashier roles.
#[derive(Debug)]
pub struct DirectoryService<S> {
    store: Arc<S>,
}

impl<S> Clone for DirectoryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> DirectoryService<S> {
    /// Creates the service over a store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a class group; the creator becomes its cashier.
    ///
    /// # Errors
    ///
    /// - `ProfileNotFound` if the actor has no parent profile
    /// - `Validation` for a blank name
    /// - `Conflict` if the name is taken
    pub async fn create_class_group(
        &self,
        actor: &Actor,
        name: &str,
        description: Option<String>,
    ) -> Result<ClassGroup, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("class group name is required".into()));
        }

        let mut tx = self.store.begin().await?;
        let creator = AccessGuard::require_parent(&mut tx, actor).await?;

        let group = ClassGroup {
            id: ClassGroupId::new(),
            name: name.to_string(),
            description,
        };
        tx.insert_class_group(&group).await.map_err(|e| match e {
            StoreError::Conflict(_) => {
                LedgerError::Conflict(format!("class group {name} already exists"))
            }
            other => other.into(),
        })?;
        tx.set_group_role(group.id, creator.id, ParentRole::Cashier)
            .await?;
        tx.commit().await?;

        info!(class_group_id = %group.id, cashier = %creator.id, "class group created");
        Ok(group)
    }

    /// Reads a class group. Visible to admins, members and guardians.
    pub async fn class_group(
        &self,
        actor: &Actor,
        class: ClassGroupId,
    ) -> Result<ClassGroup, LedgerError> {
        let mut tx = self.store.begin().await?;
        let group = tx
            .find_class_group(class)
            .await?
            .ok_or(LedgerError::ClassGroupNotFound(class))?;
        let parent = AccessGuard::parent_of(&mut tx, actor).await?;
        let allowed = AccessGuard::can_view_class(&mut tx, actor, parent.as_ref(), class).await?;
        AccessGuard::ensure(allowed, "not a member of this class group")?;
        Ok(group)
    }

    /// Hands the cashier role to another member of the class.
    ///
    /// The former cashier becomes a member; both role changes commit together.
    ///
    /// # Errors
    ///
    /// - `ClassGroupNotFound` / `ParentNotFound` for unknown ids
    /// - `PermissionDenied` unless the actor is the current cashier
    /// - `Validation` if the new parent is not a member or already cashier
    pub async fn transfer_cashier(
        &self,
        actor: &Actor,
        class: ClassGroupId,
        new_cashier: ParentId,
    ) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        tx.find_class_group(class)
            .await?
            .ok_or(LedgerError::ClassGroupNotFound(class))?;
        tx.find_parent(new_cashier)
            .await?
            .ok_or(LedgerError::ParentNotFound(new_cashier))?;
        let current = AccessGuard::require_parent(&mut tx, actor).await?;

        let is_cashier = AccessGuard::is_cashier(&mut tx, current.id, class).await?;
        AccessGuard::ensure(is_cashier, "only the current cashier can hand over the role")?;

        match tx.group_role(class, new_cashier).await? {
            None => {
                return Err(LedgerError::Validation(
                    "parent is not a member of the class".into(),
                ));
            }
            Some(ParentRole::Cashier) => {
                return Err(LedgerError::Validation(
                    "parent is already the cashier".into(),
                ));
            }
            Some(ParentRole::Member) => {}
        }

        tx.set_group_role(class, current.id, ParentRole::Member)
            .await?;
        tx.set_group_role(class, new_cashier, ParentRole::Cashier)
            .await?;
        tx.commit().await?;

        info!(class_group_id = %class, from = %current.id, to = %new_cashier, "cashier transferred");
        Ok(())
    }

    /// Enrols a child and its first guardian. Admin only.
    ///
    /// The guardian joins the class as a member unless they already hold a role.
    pub async fn register_child(&self, actor: &Actor, input: NewChild) -> Result<Child, LedgerError> {
        AccessGuard::ensure_admin(actor)?;
        if input.name.trim().is_empty() || input.surname.trim().is_empty() {
            return Err(LedgerError::Validation("child name and surname are required".into()));
        }

        let mut tx = self.store.begin().await?;
        tx.find_class_group(input.class_group_id)
            .await?
            .ok_or(LedgerError::ClassGroupNotFound(input.class_group_id))?;
        tx.find_parent(input.parent_id)
            .await?
            .ok_or(LedgerError::ParentNotFound(input.parent_id))?;

        let child = Child {
            id: ChildId::new(),
            name: input.name.trim().to_string(),
            surname: input.surname.trim().to_string(),
            class_group_id: input.class_group_id,
        };
        tx.insert_child(&child).await?;
        tx.insert_parenthood(input.parent_id, child.id).await?;
        if tx
            .group_role(input.class_group_id, input.parent_id)
            .await?
            .is_none()
        {
            tx.set_group_role(input.class_group_id, input.parent_id, ParentRole::Member)
                .await?;
        }
        tx.commit().await?;

        info!(child_id = %child.id, class_group_id = %child.class_group_id, "child registered");
        Ok(child)
    }

    /// Adds another guardian to an existing child. Admin only.
    pub async fn add_guardian(
        &self,
        actor: &Actor,
        child: ChildId,
        parent: ParentId,
    ) -> Result<(), LedgerError> {
        AccessGuard::ensure_admin(actor)?;
        let mut tx = self.store.begin().await?;
        let found = tx
            .find_child(child)
            .await?
            .ok_or(LedgerError::ChildNotFound(child))?;
        tx.find_parent(parent)
            .await?
            .ok_or(LedgerError::ParentNotFound(parent))?;
        tx.insert_parenthood(parent, child).await.map_err(|e| match e {
            StoreError::Conflict(_) => LedgerError::Conflict("already a guardian".into()),
            other => other.into(),
        })?;
        if tx.group_role(found.class_group_id, parent).await?.is_none() {
            tx.set_group_role(found.class_group_id, parent, ParentRole::Member)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

//! Directory types: parents, children, class groups and roles.

use std::fmt;

use serde::{Deserialize, Serialize};
use schoolmoney_shared::Privilege;
use schoolmoney_shared::types::{BankAccountId, ChildId, ClassGroupId, ParentId, UserId};

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Authenticated user.
    pub user_id: UserId,
    /// Privilege from the token.
    pub privilege: Privilege,
}

impl Actor {
    /// A standard (non-admin) actor.
    #[must_use]
    pub const fn standard(user_id: UserId) -> Self {
        Self {
            user_id,
            privilege: Privilege::Standard,
        }
    }

    /// An administrator.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            privilege: Privilege::Admin,
        }
    }

    /// Returns true for administrators.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.privilege.is_admin()
    }
}

/// A parent profile with its wallet account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    /// Parent ID.
    pub id: ParentId,
    /// Owning user.
    pub user_id: UserId,
    /// First name.
    pub name: String,
    /// Last name.
    pub surname: String,
    /// Wallet account.
    pub bank_account_id: BankAccountId,
}

/// A child enrolled in one class group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Child ID.
    pub id: ChildId,
    /// First name.
    pub name: String,
    /// Last name.
    pub surname: String,
    /// Class the child attends.
    pub class_group_id: ClassGroupId,
}

/// A school class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGroup {
    /// Class group ID.
    pub id: ClassGroupId,
    /// Unique name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

/// Role of a parent within a class group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentRole {
    /// Regular member.
    Member,
    /// The single money manager of the class.
    Cashier,
}

impl fmt::Display for ParentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Member => "MEMBER",
            Self::Cashier => "CASHIER",
        })
    }
}

/// Input for a new parent profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ParentProfile {
    /// First name.
    pub name: String,
    /// Last name.
    pub surname: String,
}

/// Input for a new child.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChild {
    /// First name.
    pub name: String,
    /// Last name.
    pub surname: String,
    /// Class the child attends.
    pub class_group_id: ClassGroupId,
    /// First guardian.
    pub parent_id: ParentId,
}

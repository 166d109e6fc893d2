//! `SeaORM` entity definitions.

pub mod bank_accounts;
pub mod bank_operations;
pub mod children;
pub mod class_group_roles;
pub mod class_groups;
pub mod collection_operations;
pub mod collections;
pub mod parenthoods;
pub mod parents;
pub mod sea_orm_active_enums;

pub mod prelude {
    //! Entity aliases.
    pub use super::bank_accounts::Entity as BankAccounts;
    pub use super::bank_operations::Entity as BankOperations;
    pub use super::children::Entity as Children;
    pub use super::class_group_roles::Entity as ClassGroupRoles;
    pub use super::class_groups::Entity as ClassGroups;
    pub use super::collection_operations::Entity as CollectionOperations;
    pub use super::collections::Entity as Collections;
    pub use super::parenthoods::Entity as Parenthoods;
    pub use super::parents::Entity as Parents;
}

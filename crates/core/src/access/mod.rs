//! Access and ownership rules.
//!
//! - `types` - actors, parents, children, class groups, roles
//! - `guards` - read-only permission checks used by every engine
//! - `service` - class-group and cashier management

pub mod guards;
pub mod service;
pub mod types;


pub use guards::AccessGuard;
pub use service::DirectoryService;
pub use types::{Actor, Child, ClassGroup, NewChild, Parent, ParentProfile, ParentRole};

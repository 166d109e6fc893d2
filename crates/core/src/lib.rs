//! Core business logic for SchoolMoney.
//!
//! This crate holds the ledger and collection rules with no web or database
//! dependencies. Storage is reached through the `store` traits; the
//! PostgreSQL implementation lives in `schoolmoney-db`.
//!
//! # Modules
//!
//! - `iban` - Polish NRB account numbers and IBAN validation
//! - `ledger` - Bank accounts, the append-only operation log, parent wallets
//! - `collection` - Collection state machine and lifecycle engine
//! - `access` - Class groups, guardianship and permission guards
//! - `reports` - Participation and money summaries
//! - `store` - Transactional storage seam and the in-process store

pub mod access;
pub mod collection;
pub mod error;
pub mod iban;
pub mod ledger;
pub mod reports;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ErrorKind;

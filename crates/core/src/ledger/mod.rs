//! Bank account ledger.
//!
//! This module implements the money side of SchoolMoney:
//! - Account and operation types
//! - Balance derivation from the append-only operation log
//! - Transaction-scoped primitives (`LedgerService`, `AccountFactory`)
//! - Wallet flows for parents (`LedgerEngine`)
//! - The engine-wide error type

pub mod balance;
pub mod error;
pub mod service;
pub mod types;
pub mod wallet;

pub use balance::{balance_from_log, flow_totals};
pub use error::LedgerError;
pub use service::{AccountFactory, LedgerService};
pub use types::{AccountBalance, BankAccount, BankOperation, NewBankOperation, OperationKind};
pub use wallet::LedgerEngine;

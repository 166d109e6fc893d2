//! Polish domestic account numbers (NRB) and their IBAN form.
//!
//! - `AccountNumber` - a validated 26-digit NRB
//! - `IbanGenerator` - random, checksum-valid account numbers
//! - `AccountNumberSource` - seam used by the ledger to obtain candidates

pub mod error;
pub mod generator;
pub mod number;

#[cfg(test)]
mod props;

pub use error::IbanError;
pub use generator::{AccountNumberSource, BANK_CODES, IbanGenerator};
pub use number::{AccountNumber, is_valid_iban};

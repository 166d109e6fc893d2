//! Random account number generation.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;

use super::error::IbanError;
use super::number::AccountNumber;

/// Bank codes accepted for generated accounts.
pub const BANK_CODES: [&str; 44] = [
    "101", "102", "103", "104", "105", "106", "107", "108", "109", "114", "116", "124", "132",
    "144", "154", "158", "161", "168", "175", "184", "187", "189", "191", "193", "194", "203",
    "212", "213", "214", "215", "216", "219", "224", "229", "235", "237", "243", "247", "249",
    "251", "280", "283", "285", "291",
];

/// Candidates tried before `generate` gives up.
const MAX_CANDIDATES: u32 = 16;

const SERIAL_LENGTH: usize = 16;

/// Supplies fresh account numbers to the ledger.
///
/// Uniqueness is not guaranteed here; the store rejects duplicates and the
/// ledger asks again.
pub trait AccountNumberSource: Send + Sync {
    /// Returns a new checksum-valid account number.
    fn next_number(&self) -> Result<AccountNumber, IbanError>;
}

/// Generates random account numbers from the bank-code whitelist.
#[derive(Debug, Clone, Copy)]
pub struct IbanGenerator {
    use_timestamp: bool,
}

impl Default for IbanGenerator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl IbanGenerator {
    /// Creates a generator. With `use_timestamp` the serial starts with the
    /// current `yyMMddHHmmss`, otherwise it is fully random.
    #[must_use]
    pub const fn new(use_timestamp: bool) -> Self {
        Self { use_timestamp }
    }

    /// Generates a number using the thread-local RNG and the system clock.
    ///
    /// # Errors
    ///
    /// Returns `IbanError::Exhausted` if no candidate validated.
    pub fn generate(&self) -> Result<AccountNumber, IbanError> {
        let mut rng = rand::rng();
        self.generate_with(&mut rng, Utc::now())
    }

    /// Generates a number from an explicit RNG and clock reading.
    ///
    /// Invalid candidates are discarded and redrawn with fresh digits.
    ///
    /// # Errors
    ///
    /// Returns `IbanError::Exhausted` if no candidate validated.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<AccountNumber, IbanError> {
        for _ in 0..MAX_CANDIDATES {
            match self.candidate(rng, now) {
                Ok(number) => return Ok(number),
                Err(err) => tracing::debug!(error = %err, "discarding account number candidate"),
            }
        }
        Err(IbanError::Exhausted(MAX_CANDIDATES))
    }

    fn candidate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<AccountNumber, IbanError> {
        let bank_code = BANK_CODES.choose(rng).copied().unwrap_or(BANK_CODES[0]);
        let branch = random_digits(rng, 4);

        let mut serial = if self.use_timestamp {
            now.format("%y%m%d%H%M%S").to_string()
        } else {
            String::new()
        };
        let fill = SERIAL_LENGTH.saturating_sub(serial.len());
        serial.push_str(&random_digits(rng, fill));

        AccountNumber::assemble(bank_code, &branch, &serial)
    }
}

impl AccountNumberSource for IbanGenerator {
    fn next_number(&self) -> Result<AccountNumber, IbanError> {
        self.generate()
    }
}

fn random_digits<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

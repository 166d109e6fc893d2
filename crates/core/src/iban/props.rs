//! Property-based tests for account numbers.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::generator::IbanGenerator;
use super::number::{AccountNumber, is_valid_iban};

proptest! {
    /// Every generated number is a valid IBAN and parses back to itself.
    #[test]
    fn prop_generated_numbers_validate(seed in any::<u64>(), secs in 0i64..4_000_000_000, ts in any::<bool>()) {
        let now = Utc.timestamp_opt(secs, 0).single().unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let number = IbanGenerator::new(ts).generate_with(&mut rng, now).unwrap();

        prop_assert!(is_valid_iban(&number.to_iban()));
        prop_assert_eq!(AccountNumber::parse(number.as_str()).unwrap(), number);
    }

    /// Changing any single digit breaks the checksum.
    #[test]
    fn prop_single_digit_change_detected(seed in any::<u64>(), pos in 0usize..26, delta in 1u8..10) {
        let mut rng = StdRng::seed_from_u64(seed);
        let number = IbanGenerator::new(false).generate_with(&mut rng, Utc::now()).unwrap();

        let mut bytes = number.as_str().as_bytes().to_vec();
        bytes[pos] = b'0' + (bytes[pos] - b'0' + delta) % 10;
        let mutated = String::from_utf8(bytes).unwrap();

        prop_assert!(AccountNumber::parse(&mutated).is_err());
    }
}

//! Validated 26-digit account numbers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::IbanError;

/// Digits in a domestic account number.
pub const NRB_LENGTH: usize = 26;

/// Country code of every generated account.
pub const COUNTRY_CODE: &str = "PL";

const ROUTING_WEIGHTS: [u32; 7] = [3, 9, 7, 1, 3, 9, 7];

/// A Polish domestic account number: 2 check digits, 8-digit routing number
/// and a 16-digit serial. `"PL" + number` is always a valid IBAN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Builds a number from its parts, computing both check digits.
    ///
    /// `bank_code` must be 3 digits, `branch` 4 digits and `serial` 16 digits.
    ///
    /// # Errors
    ///
    /// Returns `IbanError` if any part has the wrong length or a non-digit.
    pub fn assemble(bank_code: &str, branch: &str, serial: &str) -> Result<Self, IbanError> {
        require_digits(bank_code, 3)?;
        require_digits(branch, 4)?;
        require_digits(serial, 16)?;

        let mut routing = String::with_capacity(8);
        routing.push_str(bank_code);
        routing.push_str(branch);
        routing.push(routing_check_digit(&routing));

        let bban = format!("{routing}{serial}");
        let check = iban_check_digits(&bban)?;
        Ok(Self(format!("{check:02}{bban}")))
    }

    /// Parses and validates an externally supplied number.
    ///
    /// Spaces are ignored and an optional `PL` prefix is accepted.
    ///
    /// # Errors
    ///
    /// Returns `IbanError` if the input is not 26 digits or fails mod-97.
    pub fn parse(input: &str) -> Result<Self, IbanError> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = match compact.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case(COUNTRY_CODE) => &compact[2..],
            _ => compact.as_str(),
        };
        require_digits(digits, NRB_LENGTH)?;
        if mod97(&format!("{}{}{}", &digits[2..], country_digits(), &digits[..2]))? != 1 {
            return Err(IbanError::ChecksumMismatch);
        }
        Ok(Self(digits.to_string()))
    }

    /// Returns the 26 digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 8-digit routing number.
    #[must_use]
    pub fn routing(&self) -> &str {
        &self.0[2..10]
    }

    /// Returns the 28-character IBAN.
    #[must_use]
    pub fn to_iban(&self) -> String {
        format!("{COUNTRY_CODE}{}", self.0)
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = IbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = IbanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

/// Checks any IBAN string (ISO 13616), not only Polish ones.
#[must_use]
pub fn is_valid_iban(input: &str) -> bool {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !compact.is_ascii() || !(15..=34).contains(&compact.len()) {
        return false;
    }
    let (head, body) = compact.split_at(4);
    if !head[..2].chars().all(|c| c.is_ascii_uppercase()) || !head[2..].chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Some(expanded) = expand_letters(&format!("{body}{head}")) else {
        return false;
    };
    matches!(mod97(&expanded), Ok(1))
}

fn require_digits(value: &str, expected: usize) -> Result<(), IbanError> {
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_digit()) {
        return Err(IbanError::InvalidCharacter(bad));
    }
    if value.len() != expected {
        return Err(IbanError::InvalidLength {
            expected,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Sort-code check digit over bank code + branch.
fn routing_check_digit(first_seven: &str) -> char {
    let sum: u32 = first_seven
        .chars()
        .filter_map(|c| c.to_digit(10))
        .zip(ROUTING_WEIGHTS)
        .map(|(d, w)| d * w)
        .sum();
    char::from_digit((10 - sum % 10) % 10, 10).unwrap_or('0')
}

fn iban_check_digits(bban: &str) -> Result<u32, IbanError> {
    let remainder = mod97(&format!("{bban}{}00", country_digits()))?;
    Ok(98 - remainder)
}

/// `PL` with letters mapped to numbers (A=10 .. Z=35).
fn country_digits() -> &'static str {
    "2521"
}

fn expand_letters(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        match c {
            '0'..='9' => out.push(c),
            'A'..='Z' => out.push_str(&(u32::from(c) - u32::from('A') + 10).to_string()),
            _ => return None,
        }
    }
    Some(out)
}

fn mod97(digits: &str) -> Result<u32, IbanError> {
    digits.chars().try_fold(0u32, |acc, c| {
        let d = c.to_digit(10).ok_or(IbanError::InvalidCharacter(c))?;
        Ok((acc * 10 + d) % 97)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_assemble_produces_valid_iban() {
        let number = AccountNumber::assemble("109", "0101", "2501011200001234").unwrap();
        assert_eq!(number.as_str().len(), NRB_LENGTH);
        assert!(is_valid_iban(&number.to_iban()));
        assert_eq!(AccountNumber::parse(number.as_str()).unwrap(), number);
    }

    #[test]
    fn test_routing_check_digit() {
        // 1090101 -> 3+0+63+0+3+0+7 = 76 -> check 4
        let number = AccountNumber::assemble("109", "0101", "0000000000000000").unwrap();
        assert_eq!(number.routing(), "10901014");
    }

    #[rstest]
    #[case("PL61109010140000071219812874")]
    #[case("61 1090 1014 0000 0712 1981 2874")]
    #[case("pl61109010140000071219812874")]
    fn test_parse_known_good_numbers(#[case] input: &str) {
        let number = AccountNumber::parse(input).unwrap();
        assert_eq!(number.as_str(), "61109010140000071219812874");
        assert_eq!(number.to_iban(), "PL61109010140000071219812874");
    }

    #[test]
    fn test_parse_rejects_flipped_digit() {
        assert_eq!(
            AccountNumber::parse("61109010140000071219812875"),
            Err(IbanError::ChecksumMismatch)
        );
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(
            AccountNumber::parse("6110901014"),
            Err(IbanError::InvalidLength {
                expected: 26,
                actual: 10
            })
        );
    }

    #[test]
    fn test_assemble_rejects_letters() {
        assert_eq!(
            AccountNumber::assemble("1A9", "0101", "0000000000000000"),
            Err(IbanError::InvalidCharacter('A'))
        );
    }

    #[rstest]
    #[case("GB82WEST12345698765432", true)]
    #[case("DE89370400440532013000", true)]
    #[case("DE89370400440532013001", false)]
    #[case("XX", false)]
    #[case("PL61-109010140000071219812874", false)]
    #[case("AĄĄ1234567890123456", false)]
    #[case("PL61109010140000071219812874ż", false)]
    fn test_is_valid_iban(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_iban(input), expected);
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = "\"61109010140000071219812874\"";
        let number: AccountNumber = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&number).unwrap(), json);
        assert!(serde_json::from_str::<AccountNumber>("\"123\"").is_err());
    }
}

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced when parsing an account identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IbanError {
    #[error("invalid characters in IBAN")]
    InvalidCharacters,

    #[error("unsupported country code: {0}")]
    UnsupportedCountry(String),

    #[error("invalid length {actual} for country {country} (expected {expected})")]
    InvalidLength {
        country: String,
        expected: usize,
        actual: usize,
    },

    #[error("checksum mismatch")]
    InvalidChecksum,

    #[error("national check digits mismatch")]
    InvalidNationalCheck,
}

/// IBAN lengths per ISO 3166 country code.
const COUNTRY_LENGTHS: &[(&str, usize)] = &[
    ("AD", 24),
    ("AT", 20),
    ("BE", 16),
    ("CH", 21),
    ("DE", 22),
    ("DK", 18),
    ("ES", 24),
    ("FI", 18),
    ("FR", 27),
    ("GB", 22),
    ("IE", 22),
    ("IT", 27),
    ("LU", 20),
    ("NL", 18),
    ("NO", 15),
    ("PL", 28),
    ("PT", 25),
    ("SE", 24),
];

/// Weights of the Spanish national control digit algorithm.
const ES_WEIGHTS: [u32; 10] = [1, 2, 4, 8, 5, 10, 9, 7, 3, 6];

/// Account identifier in IBAN form.
///
/// Always stored in electronic format: uppercase, no separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iban(String);

impl Iban {
    /// Parse and validate an IBAN, accepting spaces and lowercase input.
    pub fn parse(input: &str) -> Result<Self, IbanError> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.len() < 4 || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IbanError::InvalidCharacters);
        }

        let (country, rest) = normalized.split_at(2);
        if !country.chars().all(|c| c.is_ascii_alphabetic())
            || !rest[..2].chars().all(|c| c.is_ascii_digit())
        {
            return Err(IbanError::InvalidCharacters);
        }

        let expected = COUNTRY_LENGTHS
            .iter()
            .find(|(code, _)| *code == country)
            .map(|(_, len)| *len)
            .ok_or_else(|| IbanError::UnsupportedCountry(country.to_string()))?;

        if normalized.len() != expected {
            return Err(IbanError::InvalidLength {
                country: country.to_string(),
                expected,
                actual: normalized.len(),
            });
        }

        if mod97(&format!("{}{}", &normalized[4..], &normalized[..4])) != 1 {
            return Err(IbanError::InvalidChecksum);
        }

        if country == "ES" && !spanish_bban_is_valid(&normalized[4..]) {
            return Err(IbanError::InvalidNationalCheck);
        }

        Ok(Iban(normalized))
    }

    /// Generate a random, valid Spanish IBAN.
    pub fn random_es() -> Self {
        let mut rng = rand::thread_rng();
        let mut digits = |n: usize| -> String {
            (0..n)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect()
        };

        let bank = digits(4);
        let branch = digits(4);
        let account = digits(10);

        let first = spanish_control_digit(&format!("00{bank}{branch}"));
        let second = spanish_control_digit(&account);
        let bban = format!("{bank}{branch}{first}{second}{account}");

        let check = 98 - mod97(&format!("{bban}ES00"));
        Iban(format!("ES{check:02}{bban}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn country(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 7064 mod 97-10 over an alphanumeric string (letters count as 10..35).
fn mod97(input: &str) -> u32 {
    input.chars().fold(0u32, |rem, c| match c.to_digit(36) {
        Some(v) if v >= 10 => (rem * 100 + v) % 97,
        Some(v) => (rem * 10 + v) % 97,
        None => rem,
    })
}

fn spanish_control_digit(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .zip(ES_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();

    match 11 - (sum % 11) {
        11 => 0,
        10 => 1,
        d => d,
    }
}

/// Spanish BBAN: bank(4) branch(4) control(2) account(10).
fn spanish_bban_is_valid(bban: &str) -> bool {
    if !bban.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let first = spanish_control_digit(&format!("00{}", &bban[..8]));
    let second = spanish_control_digit(&bban[10..]);

    bban[8..10] == format!("{first}{second}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_known_valid_ibans() {
        assert!(Iban::parse("ES9121000418450200051332").is_ok());
        assert!(Iban::parse("GB82WEST12345698765432").is_ok());
        assert!(Iban::parse("DE89370400440532013000").is_ok());
    }

    #[test]
    fn test_normalizes_formatting() {
        let iban = Iban::parse("es91 2100 0418 4502 0005 1332").unwrap();
        assert_eq!(iban.as_str(), "ES9121000418450200051332");
        assert_eq!(iban.country(), "ES");
    }

    #[test]
    fn test_rejects_bad_checksum() {
        assert_eq!(
            Iban::parse("ES9221000418450200051332"),
            Err(IbanError::InvalidChecksum)
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Iban::parse("ES"), Err(IbanError::InvalidCharacters));
        assert_eq!(
            Iban::parse("ES91-2100-0418"),
            Err(IbanError::InvalidCharacters)
        );
        assert!(matches!(
            Iban::parse("ES912100041845020005133"),
            Err(IbanError::InvalidLength { expected: 24, .. })
        ));
        assert!(matches!(
            Iban::parse("ZZ9121000418450200051332"),
            Err(IbanError::UnsupportedCountry(_))
        ));
    }

    #[test]
    fn test_generated_ibans_are_valid_and_distinct() {
        let generated: HashSet<String> = (0..200)
            .map(|_| {
                let iban = Iban::random_es();
                Iban::parse(iban.as_str()).expect("generated IBAN must validate");
                iban.as_str().to_string()
            })
            .collect();

        assert_eq!(generated.len(), 200);
    }
}

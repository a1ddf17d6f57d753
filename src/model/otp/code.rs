use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CODE_LENGTH: usize = 6;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// A one-time-passcode: six decimal digits, never starting with zero.
///
/// Stored and transmitted in its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(u32);

impl Code {
    /// Generate a random code, drawn uniformly from the full range.
    ///
    /// `thread_rng` is a CSPRNG, so codes are not guessable from
    /// previous ones.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX))
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for Code {
    type Err = ParseError;

    /// Parse a submitted code. The input is trimmed, but no other
    /// normalization is applied.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != CODE_LENGTH {
            return Err(ParseError::InvalidLength(s.len()));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(ParseError::InvalidChar(c));
        }
        let value = s.parse::<u32>().map_err(|_| ParseError::InvalidLength(s.len()))?;
        if !(CODE_MIN..=CODE_MAX).contains(&value) {
            return Err(ParseError::OutOfRange(value));
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for Code {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("code must contain exactly {CODE_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("code must contain only digits, got {0:?}")]
    InvalidChar(char),
    #[error("code {0} is outside the issued range")]
    OutOfRange(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_stay_in_range() {
        for _ in 0..1000 {
            let code = Code::random();
            assert!((CODE_MIN..=CODE_MAX).contains(&code.0), "{code}");
        }
    }

    #[test]
    fn display_parse_round_trip() {
        for _ in 0..100 {
            let code = Code::random();
            assert_eq!(code, code.to_string().parse().unwrap());
        }
    }

    #[test]
    fn parse_trims_whitespace_only() {
        assert_eq!(" 123456 ".parse::<Code>().unwrap(), Code(123_456));
        assert!(matches!(
            "12 456".parse::<Code>(),
            Err(ParseError::InvalidChar(' '))
        ));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            "12345".parse::<Code>(),
            Err(ParseError::InvalidLength(5))
        ));
        assert!(matches!(
            "1234567".parse::<Code>(),
            Err(ParseError::InvalidLength(7))
        ));
        assert!(matches!(
            "12345x".parse::<Code>(),
            Err(ParseError::InvalidChar('x'))
        ));
        // A leading zero cannot have been issued.
        assert!(matches!(
            "012345".parse::<Code>(),
            Err(ParseError::OutOfRange(12_345))
        ));
    }

    #[test]
    fn serde_uses_string_form() {
        let code = Code(654_321);
        let json = rocket::serde::json::serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"654321\"");
        let back: Code = rocket::serde::json::serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A voter's email address, normalized to trimmed lowercase.
///
/// Normalization happens at the boundary so the unique index on `email`
/// is genuinely case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if is_valid(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(EmailError(s.trim().to_string()))
        }
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[derive(Debug, Error)]
#[error("invalid email address: {0:?}")]
pub struct EmailError(String);

/// `local@domain.tld`: alphanumerics plus a small punctuation set in the
/// local part, alphanumerics/dots/hyphens in the domain, and an alphabetic
/// top-level domain of at least two characters.
fn is_valid(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return false;
    }
    let Some((head, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !head.is_empty()
        && head
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c))
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Email {
        pub fn example() -> Self {
            "voter@example.com".parse().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_normalizes() {
        let email = "  Voter@Example.COM ".parse::<Email>().unwrap();
        assert_eq!(email.as_str(), "voter@example.com");

        for ok in [
            "a@x.io",
            "first.last@sub.domain.org",
            "user+tag@mail.co.uk",
            "u_%-x@host-name.com",
        ] {
            assert!(ok.parse::<Email>().is_ok(), "{ok}");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "plain",
            "@x.com",
            "a@",
            "a@nodot",
            "a@.com",
            "a@x.c",
            "a@x.c0m",
            "a b@x.com",
            "a@x y.com",
        ] {
            assert!(bad.parse::<Email>().is_err(), "{bad:?}");
        }
    }
}

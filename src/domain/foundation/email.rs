//! Email address value object used to key referral invitations.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A normalized (trimmed, lowercased) email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parses and normalizes an email address.
    ///
    /// Only structural checks are made: one `@`, a non-empty local part,
    /// and a dotted domain without whitespace.
    pub fn try_new(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::empty_field("email"));
        }
        if normalized.len() > 254 {
            return Err(ValidationError::out_of_range(
                "email_length",
                3,
                254,
                normalized.len() as i64,
            ));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid_format("email", "contains whitespace"));
        }

        let mut parts = normalized.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => {
                return Err(ValidationError::invalid_format(
                    "email",
                    "expected exactly one '@'",
                ))
            }
        };
        if local.is_empty() {
            return Err(ValidationError::invalid_format("email", "missing local part"));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(ValidationError::invalid_format("email", "invalid domain"));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let email = Email::try_new("  Alice@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn rejects_missing_at() {
        assert!(Email::try_new("alice.example.com").is_err());
    }

    #[test]
    fn rejects_multiple_at() {
        assert!(Email::try_new("a@b@example.com").is_err());
    }

    #[test]
    fn rejects_undotted_domain() {
        assert!(Email::try_new("alice@localhost").is_err());
        assert!(Email::try_new("alice@example.").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            Email::try_new("   "),
            Err(ValidationError::EmptyField { .. })
        ));
    }
}

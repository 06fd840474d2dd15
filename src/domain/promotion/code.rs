//! Redeemable code string value object.
//!
//! Shared by promo and referral codes. Codes are case-insensitive: they are
//! normalized to uppercase before lookup and storage.
//!
//! # Validation Rules
//!
//! - Length: 3-32 characters after trimming
//! - Characters: ASCII alphanumerics, `-` and `_`
//! - Must start and end with an alphanumeric character

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};

/// Minimum code length.
pub const MIN_CODE_LEN: usize = 3;

/// Maximum code length.
pub const MAX_CODE_LEN: usize = 32;

/// A validated, uppercase-normalized code such as `SAVE10` or `REF-7KQ2M9XA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CodeString(String);

impl CodeString {
    /// Creates a new CodeString, validating and normalizing the input.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - Code is empty
    /// - Length is outside 3-32
    /// - Characters other than alphanumerics, `-` and `_` are present
    /// - Code starts or ends with a separator
    pub fn try_new(code: &str) -> Result<Self, ValidationError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("code"));
        }

        let normalized = trimmed.to_uppercase();

        if normalized.len() < MIN_CODE_LEN || normalized.len() > MAX_CODE_LEN {
            return Err(ValidationError::out_of_range(
                "code_length",
                MIN_CODE_LEN as i64,
                MAX_CODE_LEN as i64,
                normalized.len() as i64,
            ));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::invalid_format(
                "code",
                "alphanumeric characters, '-' and '_' only",
            ));
        }

        let first = normalized.chars().next();
        let last = normalized.chars().last();
        if !first.map_or(false, |c| c.is_ascii_alphanumeric())
            || !last.map_or(false, |c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::invalid_format(
                "code",
                "must start and end with an alphanumeric character",
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CodeString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for CodeString {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl TryFrom<String> for CodeString {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(&value)
    }
}

impl From<CodeString> for String {
    fn from(value: CodeString) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ════════════════════════════════════════════════════════════════════════════
    // Valid Code Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn simple_code_parses() {
        let code = CodeString::try_new("SAVE10").unwrap();
        assert_eq!(code.as_str(), "SAVE10");
    }

    #[test]
    fn lowercase_input_normalizes_to_uppercase() {
        let code = CodeString::try_new("  save10 ").unwrap();
        assert_eq!(code.as_str(), "SAVE10");
    }

    #[test]
    fn separators_inside_code_are_allowed() {
        assert!(CodeString::try_new("REF-7KQ2M9XA").is_ok());
        assert!(CodeString::try_new("SPRING_2026").is_ok());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Invalid Code Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn empty_code_returns_error() {
        match CodeString::try_new("  ").unwrap_err() {
            ValidationError::EmptyField { field } => assert_eq!(field, "code"),
            other => panic!("Expected EmptyField error, got {:?}", other),
        }
    }

    #[test]
    fn too_short_code_returns_error() {
        match CodeString::try_new("AB").unwrap_err() {
            ValidationError::OutOfRange { field, min, max, actual } => {
                assert_eq!(field, "code_length");
                assert_eq!(min, 3);
                assert_eq!(max, 32);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected OutOfRange error, got {:?}", other),
        }
    }

    #[test]
    fn too_long_code_returns_error() {
        let long = "A".repeat(33);
        assert!(matches!(
            CodeString::try_new(&long),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn special_characters_are_rejected() {
        assert!(CodeString::try_new("SAVE@10").is_err());
        assert!(CodeString::try_new("SAVE 10").is_err());
    }

    #[test]
    fn leading_or_trailing_separator_is_rejected() {
        assert!(CodeString::try_new("-SAVE10").is_err());
        assert!(CodeString::try_new("SAVE10_").is_err());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Conversion Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn try_from_str_works() {
        let code: CodeString = "welcome5".try_into().unwrap();
        assert_eq!(code.to_string(), "WELCOME5");
    }

    #[test]
    fn deserialization_normalizes() {
        let code: CodeString = serde_json::from_str("\"save10\"").unwrap();
        assert_eq!(code.as_str(), "SAVE10");
    }
}

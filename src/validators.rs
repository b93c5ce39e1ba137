/// Input validators for account fields
/// Features:
/// 1. DoS Protection: Input length limits matching the column widths
/// 2. Control character rejection in usernames
/// 3. Email format validation

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MAX_EMAIL_LENGTH: usize = 100;
const MAX_EMAIL_LOCAL_PART: usize = 64;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates a username
/// - Non-blank, at most 50 characters
/// - No control characters
///
/// The value is returned as given: usernames are compared exactly.
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::EmptyField("username".into()));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".into(), MAX_USERNAME_LENGTH));
    }

    if username.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("username".into()));
    }

    Ok(username.to_string())
}

/// Validates an email address
/// - Checks format using RFC 5322 simplified regex
/// - At most 100 characters, local part at most 64
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".into()));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".into(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".into()));
    }

    if let Some((local, _)) = trimmed.split_once('@') {
        if local.len() > MAX_EMAIL_LOCAL_PART {
            return Err(ValidationError::InvalidFormat("email".into()));
        }
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("test.email@domain.co.uk").is_ok());
        assert!(validate_email("a@x.com").is_ok());
        assert_eq!(validate_email("  a@x.com ").unwrap(), "a@x.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@@example.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(90));
        assert!(matches!(
            validate_email(&too_long),
            Err(ValidationError::TooLong(_, MAX_EMAIL_LENGTH))
        ));

        let long_local = format!("{}@x.io", "a".repeat(65));
        assert!(validate_email(&long_local).is_err());
    }

    #[test]
    fn test_valid_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("Dark Knight_99").is_ok());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_username_limits() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_control_characters() {
        assert!(matches!(
            validate_username("ali\0ce"),
            Err(ValidationError::SuspiciousContent(_))
        ));
        assert!(validate_username("bob\n").is_err());
    }
}

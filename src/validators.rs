/// Input validators
///
/// Every request field that reaches a store passes through here first.
/// Validators return the cleaned value (trimmed, and lowercased for
/// emails) so handlers never persist raw input.

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::MAX_PASSWORD_BYTES;
use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_DESCRIPTION_LENGTH: usize = 2048;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // ISO 4217 shape
    static ref CURRENCY_REGEX: Regex = Regex::new(r"^[A-Z]{3}$").unwrap();
}

/// Validates and normalizes an email address
/// - Checks format using RFC 5322 simplified regex
/// - Verifies length constraints
/// - Returns the trimmed, lowercased address
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let normalized = email.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if normalized.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(&normalized) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(normalized)
}

/// Validates a short free-text field (first name, last name, location,
/// organisation or item name)
pub fn is_valid_name(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_NAME_LENGTH));
    }

    if has_suspicious_text_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates an item description; empty is allowed
pub fn is_valid_description(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();

    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong(
            "description".to_string(),
            MAX_DESCRIPTION_LENGTH,
        ));
    }

    if trimmed.contains('\0') {
        return Err(ValidationError::SuspiciousContent("description".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Password strength: 8 characters to 72 bytes, at least one lowercase
/// letter, one uppercase letter and one digit. Never trimmed.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_BYTES,
        ));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(has_lower && has_upper && has_digit) {
        return Err(ValidationError::Constraint(
            "password must contain an uppercase letter, a lowercase letter and a digit"
                .to_string(),
        ));
    }

    Ok(())
}

/// Three-letter uppercase currency code, e.g. `EUR`
pub fn is_valid_currency(currency: &str) -> Result<String, ValidationError> {
    let trimmed = currency.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("currency".to_string()));
    }

    if !CURRENCY_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("currency".to_string()));
    }

    Ok(trimmed.to_string())
}

pub fn is_valid_amount(amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ValidationError::Constraint(
            "amount must be a non-negative number".to_string(),
        ));
    }
    Ok(amount)
}

pub fn is_valid_quantity(quantity: i32) -> Result<i32, ValidationError> {
    if quantity < 0 {
        return Err(ValidationError::Constraint(
            "quantity must not be negative".to_string(),
        ));
    }
    Ok(quantity)
}

/// Detects suspicious patterns in email addresses
fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part is capped at 64 octets
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}

fn has_suspicious_text_patterns(value: &str) -> bool {
    if value.chars().any(|c| c.is_control()) {
        return true;
    }

    let special_char_count = value
        .chars()
        .filter(|c| {
            !c.is_alphanumeric()
                && !c.is_whitespace()
                && !matches!(c, '-' | '.' | '_' | '\'' | '&' | ',' | '(' | ')')
        })
        .count();

    special_char_count > 5
}

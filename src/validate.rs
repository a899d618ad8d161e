//! Field-level validation for raw input.
//!
//! Each validator takes the string a presentation layer collected and either
//! returns the normalized value or fails with [`RecordsError::InvalidField`].

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{RecordsError, RecordsResult};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("email pattern compiles")
    })
}

/// Returns the trimmed name, rejecting blank input.
pub fn validate_name(name: &str) -> RecordsResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RecordsError::invalid("name", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Returns the trimmed id, rejecting blank input.
pub fn validate_id(id: &str) -> RecordsResult<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(RecordsError::invalid("id", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Parses a non-negative integer age.
pub fn validate_age(age: &str) -> RecordsResult<i64> {
    let trimmed = age.trim();
    let parsed: i64 = trimmed
        .parse()
        .map_err(|_| RecordsError::invalid("age", format!("not an integer: {trimmed:?}")))?;
    if parsed < 0 {
        return Err(RecordsError::invalid("age", "must be non-negative"));
    }
    Ok(parsed)
}

/// Checks the `local@domain.tld` shape and returns the trimmed email.
pub fn validate_email(email: &str) -> RecordsResult<String> {
    let trimmed = email.trim();
    if !email_pattern().is_match(trimmed) {
        return Err(RecordsError::invalid(
            "email",
            format!("expected local@domain.tld, got {trimmed:?}"),
        ));
    }
    Ok(trimmed.to_string())
}

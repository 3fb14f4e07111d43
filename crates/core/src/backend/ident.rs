//! Identifier checks for names interpolated into backend statements.
//!
//! Object types become table names or node labels and sources become column
//! names, so neither can be bound as a parameter. Everything that reaches a
//! statement as text passes through [`check`] first.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::errors::BackendError;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

/// Whether `value` is a plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
pub fn is_identifier(value: &str) -> bool {
    pattern().is_match(value)
}

/// Return `value` if it is safe to interpolate, otherwise an error naming `field`.
pub fn check<'a>(field: &'static str, value: &'a str) -> Result<&'a str, BackendError> {
    if is_identifier(value) {
        Ok(value)
    } else {
        Err(BackendError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

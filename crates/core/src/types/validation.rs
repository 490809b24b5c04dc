//! Basic form rules shared by the CRUD forms.
//!
//! These are the only checks the console performs before a request; the
//! backend remains authoritative.

use rust_decimal::Decimal;

/// A form field that failed a basic rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be at least {min}")]
    BelowMinimum { field: &'static str, min: Decimal },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{0}")]
    Invalid(String),
}

/// Require a non-blank value of at most `max` characters.
///
/// # Errors
///
/// Returns [`InputError::Required`] or [`InputError::TooLong`].
pub fn required_text(field: &'static str, value: &str, max: usize) -> Result<(), InputError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InputError::Required { field });
    }
    if trimmed.chars().count() > max {
        return Err(InputError::TooLong { field, max });
    }
    Ok(())
}

/// Require `value >= min`.
///
/// # Errors
///
/// Returns [`InputError::BelowMinimum`].
pub fn at_least(field: &'static str, value: Decimal, min: Decimal) -> Result<(), InputError> {
    if value < min {
        return Err(InputError::BelowMinimum { field, min });
    }
    Ok(())
}

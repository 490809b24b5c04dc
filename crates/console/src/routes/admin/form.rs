//! Parsing of admin form fields.
//!
//! HTML forms post every field as text. Blank optional fields mean "leave
//! unchanged" and become `None`.

use rust_decimal::Decimal;

use ad_console_core::InputError;

fn not_a_number(field: &str) -> InputError {
    InputError::Invalid(format!("{field} must be a number"))
}

/// A required amount.
pub fn decimal(field: &'static str, raw: &str) -> Result<Decimal, InputError> {
    optional_decimal(field, raw)?.ok_or(InputError::Required { field })
}

pub fn optional_decimal(field: &str, raw: &str) -> Result<Option<Decimal>, InputError> {
    let raw = raw.trim().replace(',', "");
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| not_a_number(field))
}

pub fn optional_count(field: &str, raw: &str) -> Result<Option<i64>, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(Some(n)),
        Ok(_) => Err(InputError::Invalid(format!("{field} cannot be negative"))),
        Err(_) => Err(not_a_number(field)),
    }
}

/// A percentage; a trailing `%` is accepted.
pub fn optional_rate(field: &str, raw: &str) -> Result<Option<f64>, InputError> {
    let raw = raw.trim().trim_end_matches('%').trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(rate) if rate.is_finite() => Ok(Some(rate)),
        _ => Err(not_a_number(field)),
    }
}

/// Trimmed text, `None` when blank.
pub fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Decimal as shown in an input box.
pub fn decimal_value(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decimal_fields() {
        assert_eq!(
            decimal("budget", " 1,500.50 "),
            Ok(Decimal::from_str("1500.50").expect("decimal"))
        );
        assert_eq!(
            decimal("budget", ""),
            Err(InputError::Required { field: "budget" })
        );
        assert!(decimal("budget", "lots").is_err());
        assert_eq!(optional_decimal("cost", "  "), Ok(None));
    }

    #[test]
    fn test_count_fields() {
        assert_eq!(optional_count("clicks", "12"), Ok(Some(12)));
        assert_eq!(optional_count("clicks", ""), Ok(None));
        assert!(optional_count("clicks", "-1").is_err());
        assert!(optional_count("clicks", "1.5").is_err());
    }

    #[test]
    fn test_rate_fields() {
        assert_eq!(optional_rate("click rate", "2.5%"), Ok(Some(2.5)));
        assert_eq!(optional_rate("click rate", "3"), Ok(Some(3.0)));
        assert!(optional_rate("click rate", "NaN").is_err());
    }

    #[test]
    fn test_text_and_display() {
        assert_eq!(optional_text("  "), None);
        assert_eq!(optional_text(" N-7 ").as_deref(), Some("N-7"));
        assert_eq!(
            decimal_value(Decimal::from_str("100.00").expect("decimal")),
            "100"
        );
    }
}

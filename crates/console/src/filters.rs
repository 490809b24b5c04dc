//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use rust_decimal::{Decimal, RoundingStrategy};

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats an amount with two decimals and thousands separators.
///
/// Usage in templates: `{{ plan.budget|money }}`
#[askama::filter_fn]
pub fn money(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text
        .parse::<Decimal>()
        .map_or(text, format_money))
}

/// Formats a rate that is already a percentage.
///
/// Usage in templates: `{{ plan.click_rate|percent }}`
#[askama::filter_fn]
pub fn percent(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text
        .parse::<f64>()
        .map_or_else(|_| format!("{text}%"), |rate| format!("{rate:.2}%")))
}

/// `1234567.891` → `1,234,567.89`.
#[must_use]
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_format_money() {
        let cases = [
            ("0", "0.00"),
            ("5", "5.00"),
            ("999.999", "1,000.00"),
            ("1234567.891", "1,234,567.89"),
            ("-1500.5", "-1,500.50"),
            ("100", "100.00"),
        ];
        for (input, expected) in cases {
            let value = Decimal::from_str(input).expect("decimal");
            assert_eq!(format_money(value), expected, "input {input}");
        }
    }
}

//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use marvo_core::format_amount;
use rust_decimal::Decimal;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a decimal amount as money, e.g. `₱1,299.50`.
///
/// Usage in templates: `{{ order.grand_total()|money }}`
#[askama::filter_fn]
pub fn money(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text
        .parse::<Decimal>()
        .map_or(text, format_amount))
}

/// Renders a 1-5 rating as filled and empty stars.
///
/// Usage in templates: `{{ review.rating|stars }}`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=5
#[askama::filter_fn]
pub fn stars(rating: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let filled = rating
        .to_string()
        .parse::<f64>()
        .map_or(0, |r| r.round().clamp(0.0, 5.0) as usize);
    Ok(format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled)))
}

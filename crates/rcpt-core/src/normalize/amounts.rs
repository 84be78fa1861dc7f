//! Amount normalization.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Normalize a raw amount into a non-negative decimal.
///
/// Keeps ASCII digits and the first decimal point; separators, symbols and
/// signs are dropped. Trailing fractional zeros are removed, so `6500.00`
/// becomes the integer `6500`.
pub fn normalize_amount(raw: &str) -> Option<Decimal> {
    let mut seen_point = false;
    let cleaned: String = raw
        .chars()
        .filter(|c| {
            if c.is_ascii_digit() {
                true
            } else if *c == '.' && !seen_point {
                seen_point = true;
                true
            } else {
                false
            }
        })
        .collect();

    if !cleaned.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let cleaned = cleaned.trim_end_matches('.');
    let cleaned = if cleaned.starts_with('.') {
        format!("0{}", cleaned)
    } else {
        cleaned.to_string()
    };

    Decimal::from_str(&cleaned).ok().map(|d| d.normalize())
}

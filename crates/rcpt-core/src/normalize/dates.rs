//! Date normalization to `YYYYMMDD` / `YYMMDD` digit strings.

use crate::models::receipt::ReceiptDate;

/// Normalize a raw provider date.
///
/// Every non-digit is dropped first, so `2023-05-16`, `2023.05.16` and
/// `2023년 5월 16일`-style inputs with zero-padded parts all reduce to the same
/// digit string. Eight digits are kept as-is, six digits are taken to be
/// `YYMMDD`, longer runs (a date followed by a time) keep their first eight
/// digits. Anything else is missing.
pub fn normalize_date(raw: &str) -> Option<ReceiptDate> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        6 | 8 => ReceiptDate::from_digits(&digits),
        n if n > 8 => ReceiptDate::from_digits(&digits[..8]),
        _ => None,
    }
}

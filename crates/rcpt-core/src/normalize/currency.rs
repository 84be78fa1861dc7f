//! Currency normalization by keyword matching.

use crate::models::receipt::Currency;

const KRW_KEYWORDS: &[&str] = &["KRW", "KOR", "원", "₩", "￦"];
const USD_KEYWORDS: &[&str] = &["USD", "US", "미국", "달러", "$"];
const EUR_KEYWORDS: &[&str] = &["EUR", "EU", "유로", "€"];
const GBP_KEYWORDS: &[&str] = &["GBP", "UK", "영국", "파운드", "£"];

/// Match a non-empty token against the keyword sets, in KRW, USD, EUR, GBP order.
///
/// Unmatched tokens pass through upper-cased with everything but letters and
/// digits removed, so the code is always filename-safe. A token with nothing
/// left after that is treated as absent.
pub fn match_currency(raw: &str) -> Option<Currency> {
    let token = raw.trim().to_uppercase();
    if token.is_empty() {
        return None;
    }

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| token.contains(k));

    if contains_any(KRW_KEYWORDS) {
        Some(Currency::Krw)
    } else if contains_any(USD_KEYWORDS) {
        Some(Currency::Usd)
    } else if contains_any(EUR_KEYWORDS) {
        Some(Currency::Eur)
    } else if contains_any(GBP_KEYWORDS) {
        Some(Currency::Gbp)
    } else {
        let code: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
        (!code.is_empty()).then_some(Currency::Other(code))
    }
}

/// Normalize a raw currency, falling back to `default` when the provider gave none.
pub fn normalize_currency(raw: Option<&str>, default: Option<&Currency>) -> Option<Currency> {
    raw.and_then(match_currency).or_else(|| default.cloned())
}

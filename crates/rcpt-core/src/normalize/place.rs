//! Merchant name sanitization.

use super::patterns::PLACE_DISALLOWED;

/// Clean a merchant name for use in a filename.
///
/// Keeps word characters, whitespace and Hangul; whitespace runs become a
/// single underscore; the result is capped at `max_chars` characters and
/// stripped of edge underscores. Applying it twice gives the same result.
pub fn sanitize_place(raw: &str, max_chars: usize) -> Option<String> {
    let cleaned = PLACE_DISALLOWED.replace_all(raw, "");
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let capped: String = joined.chars().take(max_chars).collect();
    let trimmed = capped.trim_matches('_');

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

//! Regex patterns shared by the field normalizers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Anything that is not a word character, whitespace or Hangul jamo/syllable
    pub static ref PLACE_DISALLOWED: Regex = Regex::new(
        r"[^\w\s\u{3131}-\u{3163}\u{AC00}-\u{D7A3}]"
    ).unwrap();
}

//! Field normalization: raw provider values to canonical, filename-safe forms.

pub mod amounts;
pub mod currency;
pub mod dates;
pub mod patterns;
pub mod place;

pub use amounts::normalize_amount;
pub use currency::{match_currency, normalize_currency};
pub use dates::normalize_date;
pub use place::sanitize_place;

use tracing::debug;

use crate::models::config::NormalizeConfig;
use crate::models::receipt::{Currency, ExtractedRecord, FieldName, NormalizedRecord};

/// Turns an [`ExtractedRecord`] into a [`NormalizedRecord`].
///
/// Pure and total: an unparseable field becomes missing, it never fails the
/// whole record.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    default_currency: Option<Currency>,
    place_max_chars: usize,
}

impl FieldNormalizer {
    /// Create a normalizer that defaults missing currencies to KRW.
    pub fn new() -> Self {
        Self {
            default_currency: Some(Currency::Krw),
            place_max_chars: 30,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self::new()
            .with_default_currency(config.default_currency.as_deref())
            .with_place_max_chars(config.place_max_chars)
    }

    /// Set the currency used when the provider returns none (`None` keeps it missing).
    pub fn with_default_currency(mut self, code: Option<&str>) -> Self {
        self.default_currency = code.and_then(match_currency);
        self
    }

    /// Set the merchant name length cap.
    pub fn with_place_max_chars(mut self, max_chars: usize) -> Self {
        self.place_max_chars = max_chars;
        self
    }

    pub fn normalize(&self, record: &ExtractedRecord) -> NormalizedRecord {
        let mut normalized = NormalizedRecord {
            date: record.date.as_deref().and_then(normalize_date),
            place: record
                .place
                .as_deref()
                .and_then(|p| sanitize_place(p, self.place_max_chars)),
            amount: record.amount.as_deref().and_then(normalize_amount),
            currency: normalize_currency(record.currency.as_deref(), self.default_currency.as_ref()),
            ..Default::default()
        };
        normalized.refresh_missing();

        debug!(
            date = %normalized.display_field(FieldName::Date),
            place = %normalized.display_field(FieldName::Place),
            amount = %normalized.display_field(FieldName::Amount),
            currency = %normalized.display_field(FieldName::Currency),
            missing = normalized.missing_fields.len(),
            "normalized record"
        );

        normalized
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize with the default settings.
pub fn normalize(record: &ExtractedRecord) -> NormalizedRecord {
    FieldNormalizer::new().normalize(record)
}

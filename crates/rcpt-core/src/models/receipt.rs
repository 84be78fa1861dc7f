//! Receipt data models: raw provider extractions and their normalized form.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel written in place of a field that could not be extracted.
pub const NA: &str = "NA";

/// Raw field set returned by an extraction provider, before normalization.
///
/// Providers are loose about types: dates and amounts arrive as strings or
/// numbers, and "not found" may be `null`, an empty string or a literal
/// `"null"`. All of those deserialize to `None` here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Transaction date in whatever format the provider returned.
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,

    /// Merchant or store name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub place: Option<String>,

    /// Total amount, possibly with separators or currency symbols.
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,

    /// Currency code, name or symbol.
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,

    /// Raw provider response, kept for the text dump.
    #[serde(skip)]
    pub raw_text: Option<String>,
}

impl ExtractedRecord {
    /// A record with every field absent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach the raw provider response.
    pub fn with_raw_text(mut self, raw: impl Into<String>) -> Self {
        self.raw_text = Some(raw.into());
        self
    }
}

/// Returns true for the placeholder strings providers use for "nothing found".
pub(crate) fn is_absent_token(s: &str) -> bool {
    let t = s.trim();
    t.is_empty()
        || t.eq_ignore_ascii_case("null")
        || t.eq_ignore_ascii_case("none")
        || t.eq_ignore_ascii_case("na")
        || t.eq_ignore_ascii_case("n/a")
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !is_absent_token(&s) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The four receipt fields, in filename order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Date,
    Place,
    Amount,
    Currency,
}

impl FieldName {
    pub const ALL: [FieldName; 4] = [
        FieldName::Date,
        FieldName::Place,
        FieldName::Amount,
        FieldName::Currency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Date => "date",
            FieldName::Place => "place",
            FieldName::Amount => "amount",
            FieldName::Currency => "currency",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized receipt date: six (`YYMMDD`) or eight (`YYYYMMDD`) ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptDate {
    digits: String,
}

impl ReceiptDate {
    /// Wrap a digit string of length 6 or 8. Anything else is rejected.
    pub fn from_digits(digits: &str) -> Option<Self> {
        let ok = matches!(digits.len(), 6 | 8) && digits.bytes().all(|b| b.is_ascii_digit());
        ok.then(|| Self {
            digits: digits.to_string(),
        })
    }

    /// True when the date carries a four-digit year in 1900..=2099.
    pub fn has_century(&self) -> bool {
        self.digits.len() == 8
            && self.digits[..4]
                .parse::<u32>()
                .map(|year| (1900..=2099).contains(&year))
                .unwrap_or(false)
    }

    /// Storage view: the digits as normalized (8 digits when available).
    pub fn canonical(&self) -> &str {
        &self.digits
    }

    /// Filename view: `YYMMDD` when the century is known, otherwise the digits unchanged.
    pub fn filename_view(&self) -> &str {
        if self.has_century() {
            &self.digits[2..]
        } else {
            &self.digits
        }
    }
}

impl fmt::Display for ReceiptDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits)
    }
}

/// Normalized currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Currency {
    Krw,
    Usd,
    Eur,
    Gbp,
    /// Unrecognized token, upper-cased.
    Other(String),
}

impl Currency {
    pub fn code(&self) -> &str {
        match self {
            Currency::Krw => "KRW",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Other(code) => code,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Output of field normalization. `None` fields are rendered as [`NA`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub date: Option<ReceiptDate>,
    pub place: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub missing_fields: BTreeSet<FieldName>,
}

impl NormalizedRecord {
    /// Recompute `missing_fields` from the field values.
    pub(crate) fn refresh_missing(&mut self) {
        self.missing_fields = FieldName::ALL
            .into_iter()
            .filter(|field| !self.has(*field))
            .collect();
    }

    pub fn has(&self, field: FieldName) -> bool {
        match field {
            FieldName::Date => self.date.is_some(),
            FieldName::Place => self.place.is_some(),
            FieldName::Amount => self.amount.is_some(),
            FieldName::Currency => self.currency.is_some(),
        }
    }

    /// True when no field could be normalized.
    pub fn is_empty(&self) -> bool {
        self.missing_fields.len() == FieldName::ALL.len()
    }

    /// Field value as text, or [`NA`].
    pub fn display_field(&self, field: FieldName) -> String {
        match field {
            FieldName::Date => self.date.as_ref().map(|d| d.canonical().to_string()),
            FieldName::Place => self.place.clone(),
            FieldName::Amount => self.amount.map(|a| a.to_string()),
            FieldName::Currency => self.currency.as_ref().map(|c| c.code().to_string()),
        }
        .unwrap_or_else(|| NA.to_string())
    }
}

/// Amounts serialize as JSON numbers: integers when there is no fractional part.
fn amount_json(amount: &Decimal) -> serde_json::Value {
    if amount.scale() == 0 {
        if let Some(n) = amount.to_u64() {
            return serde_json::Value::from(n);
        }
    }
    amount
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(amount.to_string()))
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("date", &self.display_field(FieldName::Date))?;
        map.serialize_entry("place", &self.display_field(FieldName::Place))?;
        match &self.amount {
            Some(amount) => map.serialize_entry("amount", &amount_json(amount))?,
            None => map.serialize_entry("amount", NA)?,
        }
        map.serialize_entry("currency", &self.display_field(FieldName::Currency))?;
        map.serialize_entry(
            "date_filename",
            self.date.as_ref().map(|d| d.filename_view()).unwrap_or(NA),
        )?;
        map.serialize_entry("missing_fields", &self.missing_fields)?;
        map.end()
    }
}

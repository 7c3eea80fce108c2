//! Shared value types for the reconciliation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values that participate in computations: elapsed-day arithmetic and the
//! typed values written into board fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 timestamp as returned by the GitHub API.
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Whole days elapsed from `self` until `later`.
    ///
    /// Truncates toward zero: 47 hours is one day, not two.
    pub fn whole_days_until(self, later: Timestamp) -> i64 {
        (later.0 - self.0).num_days()
    }

    /// Formats the calendar date as `YYYY-MM-DD`, the shape board `Date`
    /// fields accept.
    pub fn to_iso_date(self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// The value kind of a board field.
///
/// The set is closed; each kind has exactly one wire shape (see
/// [`crate::mutation`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Free text.
    Text,
    /// Floating point number.
    Number,
    /// Option id of a single-select field.
    SingleSelect,
    /// ISO-8601 calendar date.
    Date,
}

impl ValueKind {
    /// Name of the GraphQL scalar the value variable is declared as.
    pub fn graphql_type(self) -> &'static str {
        match self {
            ValueKind::Text | ValueKind::SingleSelect => "String!",
            ValueKind::Number => "Float!",
            ValueKind::Date => "Date!",
        }
    }

    /// Key inside the `value: { ... }` input object.
    pub fn wrapper_key(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Date => "date",
            ValueKind::SingleSelect => "singleSelectOptionId",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::SingleSelect => "single-select",
            ValueKind::Date => "date",
        };
        f.write_str(name)
    }
}

/// A runtime value destined for a board field.
///
/// Text, date, and single-select values are all strings on the wire; only
/// numbers travel as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A number, sent as a JSON number.
    Number(f64),
    /// Text, an ISO date, or a single-select option id.
    String(String),
}

impl FieldValue {
    /// Shorthand for a string value.
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::String(value.into())
    }

    /// Returns `true` if this value can be written into a field of `kind`.
    pub fn fits(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Number(_), ValueKind::Number)
                | (
                    FieldValue::String(_),
                    ValueKind::Text | ValueKind::Date | ValueKind::SingleSelect
                )
        )
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_whole_days_truncates() {
        let start = ts(2024, 3, 1, 0);
        let later = Timestamp::from_utc(start.as_datetime() + Duration::hours(47));
        assert_eq!(start.whole_days_until(later), 1);
        assert_eq!(start.whole_days_until(ts(2024, 3, 11, 0)), 10);
    }

    #[test]
    fn test_iso_date_and_rfc3339_parse() {
        let parsed = Timestamp::parse_rfc3339("2024-05-17T10:20:30Z").unwrap();
        assert_eq!(parsed.to_iso_date(), "2024-05-17");
        assert!(Timestamp::parse_rfc3339("yesterday").is_none());
    }

    #[test]
    fn test_value_fits_kind() {
        assert!(FieldValue::from(3_i64).fits(ValueKind::Number));
        assert!(!FieldValue::from(3_i64).fits(ValueKind::Text));
        assert!(FieldValue::text("x").fits(ValueKind::SingleSelect));
        assert!(FieldValue::text("2024-01-01").fits(ValueKind::Date));
        assert!(!FieldValue::text("7").fits(ValueKind::Number));
    }
}

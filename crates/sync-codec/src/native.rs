//! Destination-native literals.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use sync_core::TypedValue;

/// A converted row, ready for a destination statement.
pub type NativeRow = IndexMap<String, NativeValue>;

/// A value in the representation a destination accepts.
///
/// Temporal variants carry the number of fractional-second digits the codec
/// chose; rendering truncates to that precision.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time { value: NaiveTime, fraction: u8 },
    Timestamp { value: DateTime<Utc>, fraction: u8 },
}

impl NativeValue {
    /// The direct native form of a value that has no registered codec.
    ///
    /// Nothing is re-encoded: binary stays raw bytes, documents stay JSON.
    pub fn passthrough(value: &TypedValue) -> Self {
        match value {
            TypedValue::Null => NativeValue::Null,
            TypedValue::Boolean(b) => NativeValue::Bool(*b),
            TypedValue::Integer(i) => NativeValue::Int(*i),
            TypedValue::Float(f) => NativeValue::Float(*f),
            TypedValue::Decimal(d) => NativeValue::Decimal(*d),
            TypedValue::String(s) => NativeValue::Text(s.clone()),
            TypedValue::Binary(b) => NativeValue::Bytes(b.clone()),
            TypedValue::Date(d) => NativeValue::Date(*d),
            TypedValue::Time(t) => NativeValue::Time {
                value: *t,
                fraction: 9,
            },
            TypedValue::DateTime(dt) => NativeValue::Timestamp {
                value: *dt,
                fraction: 9,
            },
            TypedValue::Array(_) | TypedValue::Map(_) | TypedValue::Raw(_) => {
                NativeValue::Json(value.to_json())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Render as a SQL literal.
    ///
    /// Text is single-quoted with embedded quotes doubled. Bytes render as a
    /// hex literal. Non-finite floats render as `NULL`.
    pub fn to_sql_literal(&self) -> String {
        self.to_sql_literal_with(quote)
    }

    /// Render as a SQL literal, quoting every string form with `quote`.
    ///
    /// Dialects whose string literals treat `\` as an escape pass their own
    /// quoting here.
    pub fn to_sql_literal_with(&self, quote: impl Fn(&str) -> String) -> String {
        match self {
            NativeValue::Null => "NULL".to_string(),
            NativeValue::Bool(b) => b.to_string(),
            NativeValue::Int(i) => i.to_string(),
            NativeValue::UInt(u) => u.to_string(),
            NativeValue::Float(f) if f.is_finite() => f.to_string(),
            NativeValue::Float(_) => "NULL".to_string(),
            NativeValue::Decimal(d) => d.to_string(),
            NativeValue::Text(s) => quote(s),
            NativeValue::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            NativeValue::Json(v) => quote(&v.to_string()),
            NativeValue::Date(d) => quote(&d.format("%Y-%m-%d").to_string()),
            NativeValue::Time { value, fraction } => quote(&format_time(value, *fraction)),
            NativeValue::Timestamp { value, fraction } => {
                let date = value.format("%Y-%m-%d").to_string();
                quote(&format!("{date} {}", format_time(&value.time(), *fraction)))
            }
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `HH:MM:SS` followed by `fraction` truncated fractional digits.
pub fn format_time(value: &NaiveTime, fraction: u8) -> String {
    let base = value.format("%H:%M:%S").to_string();
    if fraction == 0 {
        return base;
    }
    // Leap seconds carry nanos >= 1e9
    let nanos = format!("{:09}", value.nanosecond() % 1_000_000_000);
    let digits = usize::from(fraction.min(9));
    format!("{base}.{}", &nanos[..digits])
}

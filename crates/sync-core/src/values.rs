//! Typed values carried by record events.
//!
//! A `TypedValue` has no destination-specific representation. It is resolved
//! to a destination literal only through a codec registry at write time.

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The kind tag of a [`TypedValue`].
///
/// Codecs and converters are registered and looked up by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    Decimal,
    String,
    Binary,
    Date,
    Time,
    DateTime,
    Array,
    Map,
    Raw,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Decimal => "decimal",
            ValueKind::String => "string",
            ValueKind::Binary => "binary",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::DateTime => "date_time",
            ValueKind::Array => "array",
            ValueKind::Map => "map",
            ValueKind::Raw => "raw",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A destination-agnostic value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Point in time. Any timezone normalization happens before the value
    /// enters the pipeline.
    DateTime(DateTime<Utc>),
    Array(Vec<TypedValue>),
    Map(IndexMap<String, TypedValue>),
    /// Opaque document passed through from the source as-is
    Raw(serde_json::Value),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Null => ValueKind::Null,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Integer(_) => ValueKind::Integer,
            TypedValue::Float(_) => ValueKind::Float,
            TypedValue::Decimal(_) => ValueKind::Decimal,
            TypedValue::String(_) => ValueKind::String,
            TypedValue::Binary(_) => ValueKind::Binary,
            TypedValue::Date(_) => ValueKind::Date,
            TypedValue::Time(_) => ValueKind::Time,
            TypedValue::DateTime(_) => ValueKind::DateTime,
            TypedValue::Array(_) => ValueKind::Array,
            TypedValue::Map(_) => ValueKind::Map,
            TypedValue::Raw(_) => ValueKind::Raw,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn text(value: impl Into<String>) -> Self {
        TypedValue::String(value.into())
    }

    /// Render as a JSON document.
    ///
    /// Binary becomes base64 text, decimals become strings so no precision is
    /// lost, temporal values become ISO 8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::Decimal(d) => Value::String(d.to_string()),
            TypedValue::String(s) => Value::String(s.clone()),
            TypedValue::Binary(b) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            TypedValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            TypedValue::Time(t) => Value::String(t.format("%H:%M:%S%.f").to_string()),
            TypedValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            TypedValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            TypedValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            TypedValue::Raw(raw) => raw.clone(),
        }
    }

    /// Lift a JSON document into typed values.
    ///
    /// Objects become `Map`, arrays become `Array`; numbers become `Integer`
    /// when they fit in an i64 and `Float` otherwise.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => TypedValue::Null,
            Value::Bool(b) => TypedValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => TypedValue::Integer(i),
                None => n.as_f64().map(TypedValue::Float).unwrap_or(TypedValue::Null),
            },
            Value::String(s) => TypedValue::String(s.clone()),
            Value::Array(items) => TypedValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(entries) => TypedValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Integer(value as i64)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Float(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(value: Vec<u8>) -> Self {
        TypedValue::Binary(value)
    }
}

impl From<Decimal> for TypedValue {
    fn from(value: Decimal) -> Self {
        TypedValue::Decimal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tags() {
        assert_eq!(TypedValue::Null.kind(), ValueKind::Null);
        assert_eq!(TypedValue::from(true).kind(), ValueKind::Boolean);
        assert_eq!(TypedValue::from(vec![1u8, 2]).kind(), ValueKind::Binary);
        assert_eq!(TypedValue::Raw(json!({"a": 1})).kind(), ValueKind::Raw);
        assert_eq!(ValueKind::DateTime.to_string(), "date_time");
    }

    #[test]
    fn test_to_json_nested() {
        let mut map = IndexMap::new();
        map.insert("n".to_string(), TypedValue::Integer(7));
        map.insert("bin".to_string(), TypedValue::Binary(b"hi".to_vec()));
        map.insert(
            "d".to_string(),
            TypedValue::Decimal(Decimal::new(12345, 2)),
        );
        let value = TypedValue::Array(vec![TypedValue::Map(map), TypedValue::Null]);

        assert_eq!(
            value.to_json(),
            json!([{"n": 7, "bin": "aGk=", "d": "123.45"}, null])
        );
    }

    #[test]
    fn test_from_json_nested() {
        let doc = json!({"z": 1, "a": [true, 1.5]});
        let TypedValue::Map(map) = TypedValue::from_json(&doc) else {
            panic!("expected map");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("z"), Some(&TypedValue::Integer(1)));
        assert_eq!(
            map.get("a"),
            Some(&TypedValue::Array(vec![
                TypedValue::Boolean(true),
                TypedValue::Float(1.5)
            ]))
        );
    }

    #[test]
    fn test_temporal_json() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(TypedValue::Date(date).to_json(), json!("2024-03-09"));

        let time = NaiveTime::from_hms_milli_opt(8, 5, 1, 250).unwrap();
        assert_eq!(TypedValue::Time(time).to_json(), json!("08:05:01.250"));
    }
}

//! Coercion of incoming values to their declared field type.
//!
//! Sources frequently deliver temporal values as strings or epoch counts,
//! booleans as integers and decimals as strings. Coercion normalizes those
//! into the kind the declared type implies, so codec lookup sees the right
//! kind. Values already of the right kind, and kinds with no sensible
//! coercion, are returned unchanged.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sync_core::{FieldType, TypedValue};

use crate::CodecError;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub fn coerce(value: &TypedValue, field_type: &FieldType) -> Result<TypedValue, CodecError> {
    if value.is_null() {
        return Ok(TypedValue::Null);
    }

    let fail = |reason: String| CodecError::Coercion {
        kind: value.kind(),
        target: format!("{field_type:?}"),
        reason,
    };

    let coerced = match (field_type, value) {
        (FieldType::Bool, TypedValue::Integer(i)) => TypedValue::Boolean(*i != 0),
        (FieldType::Bool, TypedValue::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => TypedValue::Boolean(true),
            "false" | "f" | "0" | "no" => TypedValue::Boolean(false),
            _ => return Err(fail(format!("'{s}' is not a boolean"))),
        },

        (FieldType::TinyInt | FieldType::SmallInt | FieldType::Int | FieldType::BigInt, v) => {
            match v {
                TypedValue::Boolean(b) => TypedValue::Integer(i64::from(*b)),
                TypedValue::String(s) => TypedValue::Integer(
                    s.trim()
                        .parse()
                        .map_err(|e| fail(format!("'{s}': {e}")))?,
                ),
                TypedValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    // 2^63 itself is out of range; -2^63 is not
                    if *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                        return Err(fail(format!("{f} is out of range")));
                    }
                    TypedValue::Integer(*f as i64)
                }
                TypedValue::Decimal(d) if d.fract().is_zero() => TypedValue::Integer(
                    d.to_i64()
                        .ok_or_else(|| fail(format!("{d} is out of range")))?,
                ),
                other => other.clone(),
            }
        }

        (FieldType::Float | FieldType::Double, v) => match v {
            TypedValue::Integer(i) => TypedValue::Float(*i as f64),
            TypedValue::Decimal(d) => TypedValue::Float(
                d.to_f64()
                    .ok_or_else(|| fail(format!("{d} is out of range")))?,
            ),
            TypedValue::String(s) => TypedValue::Float(
                s.trim()
                    .parse()
                    .map_err(|e| fail(format!("'{s}': {e}")))?,
            ),
            other => other.clone(),
        },

        (FieldType::Decimal { scale, .. }, v) => {
            let decimal = match v {
                TypedValue::Decimal(d) => *d,
                TypedValue::Integer(i) => Decimal::from(*i),
                TypedValue::Float(f) => Decimal::from_f64(*f)
                    .ok_or_else(|| fail(format!("{f} is not representable")))?,
                TypedValue::String(s) => {
                    Decimal::from_str(s.trim()).map_err(|e| fail(format!("'{s}': {e}")))?
                }
                other => return Ok(other.clone()),
            };
            TypedValue::Decimal(decimal.round_dp(u32::from(*scale)))
        }

        (FieldType::Char { .. } | FieldType::VarChar { .. } | FieldType::Text, v) => match v {
            TypedValue::Integer(i) => TypedValue::String(i.to_string()),
            TypedValue::Float(f) => TypedValue::String(f.to_string()),
            TypedValue::Decimal(d) => TypedValue::String(d.to_string()),
            TypedValue::Boolean(b) => TypedValue::String(b.to_string()),
            other => other.clone(),
        },

        (FieldType::Date, v) => match v {
            TypedValue::String(s) => TypedValue::Date(
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|e| fail(format!("'{s}': {e}")))?,
            ),
            // Days since the Unix epoch
            TypedValue::Integer(days) => {
                let date = chrono::Duration::try_days(*days)
                    .zip(NaiveDate::from_ymd_opt(1970, 1, 1))
                    .and_then(|(delta, epoch)| epoch.checked_add_signed(delta))
                    .ok_or_else(|| fail(format!("{days} days is out of range")))?;
                TypedValue::Date(date)
            }
            TypedValue::DateTime(dt) => TypedValue::Date(dt.date_naive()),
            other => other.clone(),
        },

        (FieldType::Time, v) => match v {
            TypedValue::String(s) => TypedValue::Time(
                NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .map_err(|e| fail(format!("'{s}': {e}")))?,
            ),
            TypedValue::DateTime(dt) => TypedValue::Time(dt.time()),
            other => other.clone(),
        },

        (FieldType::DateTime { .. }, v) => match v {
            TypedValue::String(s) => TypedValue::DateTime(
                parse_datetime(s.trim()).ok_or_else(|| fail(format!("'{s}' is not a timestamp")))?,
            ),
            // Milliseconds since the Unix epoch
            TypedValue::Integer(ms) => TypedValue::DateTime(
                DateTime::<Utc>::from_timestamp_millis(*ms)
                    .ok_or_else(|| fail(format!("{ms} ms is out of range")))?,
            ),
            TypedValue::Date(d) => TypedValue::DateTime(d.and_time(NaiveTime::default()).and_utc()),
            other => other.clone(),
        },

        (FieldType::Json, v) => match v {
            TypedValue::String(s) => TypedValue::Raw(
                serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone())),
            ),
            TypedValue::Map(_) | TypedValue::Array(_) => TypedValue::Raw(v.to_json()),
            other => other.clone(),
        },

        (FieldType::Array { element_type }, TypedValue::Array(items)) => TypedValue::Array(
            items
                .iter()
                .map(|item| coerce(item, element_type))
                .collect::<Result<_, _>>()?,
        ),

        (_, other) => other.clone(),
    };

    Ok(coerced)
}

/// RFC 3339, or a zone-less timestamp taken as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_integer_to_bool() {
        assert_eq!(
            coerce(&TypedValue::Integer(0), &FieldType::Bool).unwrap(),
            TypedValue::Boolean(false)
        );
        assert!(coerce(&TypedValue::text("maybe"), &FieldType::Bool).is_err());
    }

    #[test]
    fn test_string_to_temporal() {
        assert_eq!(
            coerce(&TypedValue::text("2024-02-29"), &FieldType::Date).unwrap(),
            TypedValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(
            coerce(&TypedValue::text("2024-01-02 03:04:05"), &FieldType::datetime(3)).unwrap(),
            TypedValue::DateTime(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(
            coerce(
                &TypedValue::text("2024-01-02T05:04:05+02:00"),
                &FieldType::datetime(3)
            )
            .unwrap(),
            TypedValue::DateTime(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert!(coerce(&TypedValue::text("not a date"), &FieldType::Date).is_err());
    }

    #[test]
    fn test_epoch_counts() {
        assert_eq!(
            coerce(&TypedValue::Integer(1), &FieldType::Date).unwrap(),
            TypedValue::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap())
        );
        assert_eq!(
            coerce(&TypedValue::Integer(1_000), &FieldType::datetime(3)).unwrap(),
            TypedValue::DateTime(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap())
        );
    }

    #[test]
    fn test_epoch_days_out_of_range() {
        assert!(coerce(&TypedValue::Integer(i64::MAX), &FieldType::Date).is_err());
        assert!(coerce(&TypedValue::Integer(i64::MIN), &FieldType::Date).is_err());
        assert!(coerce(&TypedValue::Integer(1_000_000_000), &FieldType::Date).is_err());
    }

    #[test]
    fn test_float_to_integer_range() {
        assert_eq!(
            coerce(&TypedValue::Float(42.0), &FieldType::BigInt).unwrap(),
            TypedValue::Integer(42)
        );
        assert_eq!(
            coerce(&TypedValue::Float(-9_223_372_036_854_775_808.0), &FieldType::BigInt).unwrap(),
            TypedValue::Integer(i64::MIN)
        );
        assert!(coerce(&TypedValue::Float(1e19), &FieldType::BigInt).is_err());
        assert!(coerce(&TypedValue::Float(9_223_372_036_854_775_808.0), &FieldType::Int).is_err());
        assert!(coerce(&TypedValue::Float(-1e19), &FieldType::Int).is_err());
    }

    #[test]
    fn test_decimal_rounds_to_scale() {
        let coerced = coerce(&TypedValue::text("12.345"), &FieldType::decimal(10, 2)).unwrap();
        assert_eq!(coerced, TypedValue::Decimal(Decimal::new(1234, 2)));

        let from_int = coerce(&TypedValue::Integer(5), &FieldType::decimal(10, 2)).unwrap();
        assert_eq!(from_int, TypedValue::Decimal(Decimal::from(5)));
    }

    #[test]
    fn test_array_elements_coerced() {
        let value = TypedValue::Array(vec![TypedValue::text("1"), TypedValue::Integer(2)]);
        assert_eq!(
            coerce(&value, &FieldType::array(FieldType::Int)).unwrap(),
            TypedValue::Array(vec![TypedValue::Integer(1), TypedValue::Integer(2)])
        );
    }

    #[test]
    fn test_null_and_binary_unchanged() {
        assert_eq!(
            coerce(&TypedValue::Null, &FieldType::Int).unwrap(),
            TypedValue::Null
        );
        let bytes = TypedValue::Binary(vec![9]);
        assert_eq!(coerce(&bytes, &FieldType::Binary).unwrap(), bytes);
    }
}

//! ClickHouse value codecs.

use base64::Engine;
use sync_codec::{CodecError, CodecRegistry, NativeValue};
use sync_core::{TypedValue, ValueKind};

/// Fractional digits kept for `Time` values (hundredths of a second).
pub const TIME_FRACTION: u8 = 2;

/// Fractional digits kept for `DateTime` values.
pub const DATETIME_FRACTION: u8 = 6;

/// Registry with every ClickHouse codec registered.
pub fn codec_registry() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    register_codecs(&mut registry);
    registry
}

/// Register the ClickHouse codecs.
///
/// Documents, maps and arrays are stored as JSON text, booleans as `UInt8`,
/// binary as base64 text. Temporal values keep no timezone; callers
/// normalize to UTC before writing.
pub fn register_codecs(registry: &mut CodecRegistry) {
    for kind in [ValueKind::Raw, ValueKind::Map, ValueKind::Array] {
        registry.register(kind, Some("String"), |v| Ok(NativeValue::Text(v.to_json().to_string())));
    }

    registry
        .register(ValueKind::Boolean, Some("UInt8"), |v| match v {
            TypedValue::Boolean(b) => Ok(NativeValue::UInt(u64::from(*b))),
            other => Err(mismatch(other, "boolean")),
        })
        .register(ValueKind::Binary, Some("String"), |v| match v {
            TypedValue::Binary(bytes) => Ok(NativeValue::Text(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            )),
            other => Err(mismatch(other, "binary")),
        })
        .register(ValueKind::Integer, None, |v| match v {
            TypedValue::Integer(i) => Ok(NativeValue::Int(*i)),
            other => Err(mismatch(other, "integer")),
        })
        .register(ValueKind::Float, None, |v| match v {
            TypedValue::Float(f) => Ok(NativeValue::Float(*f)),
            other => Err(mismatch(other, "float")),
        })
        .register(ValueKind::Decimal, None, |v| match v {
            TypedValue::Decimal(d) => Ok(NativeValue::Decimal(*d)),
            other => Err(mismatch(other, "decimal")),
        })
        .register(ValueKind::String, None, |v| match v {
            TypedValue::String(s) => Ok(NativeValue::Text(s.clone())),
            other => Err(mismatch(other, "string")),
        })
        .register(ValueKind::Time, None, |v| match v {
            TypedValue::Time(t) => Ok(NativeValue::Time {
                value: *t,
                fraction: TIME_FRACTION,
            }),
            other => Err(mismatch(other, "time")),
        })
        .register(ValueKind::Date, None, |v| match v {
            TypedValue::Date(d) => Ok(NativeValue::Date(*d)),
            other => Err(mismatch(other, "date")),
        })
        .register(ValueKind::DateTime, None, |v| match v {
            TypedValue::DateTime(dt) => Ok(NativeValue::Timestamp {
                value: *dt,
                fraction: DATETIME_FRACTION,
            }),
            other => Err(mismatch(other, "datetime")),
        });
}

fn mismatch(value: &TypedValue, expected: &str) -> CodecError {
    CodecError::conversion(value.kind(), format!("expected a {expected} value"))
}

//! Raw upstream records and their normalization into [`RecordEvent`]s.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sync_core::{RecordEvent, Row, TypedValue};
use tracing::{debug, warn};

/// Unit of an upstream clock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockUnit {
    #[serde(alias = "s")]
    Seconds,
    #[default]
    #[serde(alias = "ms")]
    Millis,
    #[serde(alias = "us")]
    Micros,
    #[serde(alias = "ns")]
    Nanos,
}

impl ClockUnit {
    /// Convert a clock value in this unit to milliseconds, truncating.
    pub fn to_millis(&self, value: i64) -> Option<i64> {
        match self {
            ClockUnit::Seconds => value.checked_mul(1_000),
            ClockUnit::Millis => Some(value),
            ClockUnit::Micros => Some(value.div_euclid(1_000)),
            ClockUnit::Nanos => Some(value.div_euclid(1_000_000)),
        }
    }

    /// UTC instant at millisecond precision.
    pub fn to_datetime(&self, value: i64) -> Option<DateTime<Utc>> {
        self.to_millis(value)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// One record as delivered by an upstream change stream.
///
/// Images are JSON objects. Two object shapes are decoded specially:
/// `{"scale": n, "value": "<base64>"}` is a decimal whose unscaled value is a
/// big-endian two's-complement integer, and `{"$bytes": "<base64>"}` is a
/// byte buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// `c` (insert), `r` (snapshot read), `u` (update) or `d` (delete)
    pub op: String,
    pub table: String,
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,
    /// Upstream position of this record, stored verbatim in the checkpoint
    pub source_offset: serde_json::Value,
    /// Origin time in `clock_unit`s since the Unix epoch
    pub source_clock: i64,
    #[serde(default)]
    pub clock_unit: ClockUnit,
}

/// Normalize a raw record into a [`RecordEvent`].
///
/// Returns `None` for records that carry no decodable payload for their
/// operation, or an unknown operation tag. Such records are dropped.
pub fn normalize(raw: &RawRecord) -> Option<RecordEvent> {
    let Some(reference_time) = raw.clock_unit.to_datetime(raw.source_clock) else {
        warn!(
            "Dropping {} record for '{}': clock value {} out of range",
            raw.op, raw.table, raw.source_clock
        );
        return None;
    };

    let before = decode_image(raw, raw.before.as_ref());
    let after = decode_image(raw, raw.after.as_ref());

    let event = match raw.op.as_str() {
        "c" | "r" => after.map(|after| RecordEvent::insert(&raw.table, reference_time, after)),
        "u" => RecordEvent::update(&raw.table, reference_time, before, after).ok(),
        "d" => before.map(|before| RecordEvent::delete(&raw.table, reference_time, before)),
        other => {
            warn!("Dropping record for '{}' with unknown op '{other}'", raw.table);
            return None;
        }
    };

    if event.is_none() {
        debug!(
            "Dropping '{}' record for '{}' without a decodable payload",
            raw.op, raw.table
        );
    }
    event
}

fn decode_image(raw: &RawRecord, image: Option<&serde_json::Value>) -> Option<Row> {
    let serde_json::Value::Object(columns) = image? else {
        return None;
    };
    let mut row = Row::with_capacity(columns.len());
    for (name, value) in columns {
        match decode_value(value) {
            Ok(decoded) => {
                row.insert(name.clone(), decoded);
            }
            Err(reason) => {
                warn!(
                    "Cannot decode column '{name}' of '{}' record for '{}': {reason}",
                    raw.op, raw.table
                );
                return None;
            }
        }
    }
    Some(row)
}

/// Decode one JSON column value.
pub fn decode_value(value: &serde_json::Value) -> Result<TypedValue, String> {
    use serde_json::Value;

    match value {
        Value::Object(map) if map.len() == 1 && map.contains_key("$bytes") => {
            let encoded = map
                .get("$bytes")
                .and_then(Value::as_str)
                .ok_or("$bytes is not a base64 string")?;
            BASE64
                .decode(encoded)
                .map(TypedValue::Binary)
                .map_err(|e| format!("$bytes: {e}"))
        }
        Value::Object(map) => {
            if let Some((bytes, scale)) = decimal_parts(map) {
                return decode_decimal(&bytes, scale).map(TypedValue::Decimal);
            }
            let mut decoded = indexmap::IndexMap::with_capacity(map.len());
            for (k, v) in map {
                decoded.insert(k.clone(), decode_value(v)?);
            }
            Ok(TypedValue::Map(decoded))
        }
        Value::Array(items) => items
            .iter()
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(TypedValue::Array),
        other => Ok(TypedValue::from_json(other)),
    }
}

/// Unscaled bytes and scale of a `{"scale": n, "value": "<base64>"}` object.
///
/// Any other shape, including a `value` that is not valid base64, is an
/// ordinary map.
fn decimal_parts(map: &serde_json::Map<String, serde_json::Value>) -> Option<(Vec<u8>, u64)> {
    if map.len() != 2 {
        return None;
    }
    let scale = map.get("scale")?.as_u64()?;
    let bytes = BASE64.decode(map.get("value")?.as_str()?).ok()?;
    Some((bytes, scale))
}

/// Big-endian two's-complement unscaled value plus scale.
fn decode_decimal(bytes: &[u8], scale: u64) -> Result<Decimal, String> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(format!("unscaled value of {} bytes", bytes.len()));
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = if negative { [0xffu8; 16] } else { [0u8; 16] };
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    let unscaled = i128::from_be_bytes(buf);

    let scale = u32::try_from(scale).map_err(|_| format!("scale {scale} out of range"))?;
    Decimal::try_from_i128_with_scale(unscaled, scale).map_err(|e| e.to_string())
}

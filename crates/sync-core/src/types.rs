//! Logical field types.
//!
//! `FieldType` is the declared type of a column, independent of any destination.
//! Destinations derive their column DDL from it via the `ToDdl` trait in
//! `sync-codec`, and the write path uses it to coerce incoming values before
//! they reach the codec registry.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

use crate::values::ValueKind;

/// Declared logical type of a field.
///
/// # YAML Format
///
/// Simple types can be specified as strings:
/// ```yaml
/// type: int
/// type: text
/// ```
///
/// Parameterized types use object format:
/// ```yaml
/// type:
///   type: var_char
///   length: 255
/// type:
///   type: decimal
///   precision: 10
///   scale: 2
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Boolean value
    Bool,

    /// 8-bit signed integer
    TinyInt,

    /// 16-bit signed integer
    SmallInt,

    /// 32-bit signed integer
    Int,

    /// 64-bit signed integer
    BigInt,

    /// 32-bit IEEE 754 floating point
    Float,

    /// 64-bit IEEE 754 floating point
    Double,

    /// Exact decimal with specified precision and scale
    Decimal {
        /// Total number of digits
        precision: u8,
        /// Number of digits after the decimal point
        scale: u8,
    },

    /// Fixed-length character string
    Char {
        /// Maximum length
        length: u16,
    },

    /// Variable-length character string with max length
    VarChar {
        /// Maximum length
        length: u16,
    },

    /// Unlimited text
    Text,

    /// Binary data
    Binary,

    /// Date only (YYYY-MM-DD)
    Date,

    /// Time only (HH:MM:SS[.fraction])
    Time,

    /// Timestamp with a declared fractional-second precision (0..=9 digits)
    DateTime {
        /// Number of fractional-second digits
        fraction: u8,
    },

    /// JSON document
    Json,

    /// Array of a specific type
    Array {
        /// Element type
        element_type: Box<FieldType>,
    },

    /// String-keyed map of values
    Map,
}

impl Serialize for FieldType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            Self::Bool => serializer.serialize_str("bool"),
            Self::TinyInt => serializer.serialize_str("tiny_int"),
            Self::SmallInt => serializer.serialize_str("small_int"),
            Self::Int => serializer.serialize_str("int"),
            Self::BigInt => serializer.serialize_str("big_int"),
            Self::Float => serializer.serialize_str("float"),
            Self::Double => serializer.serialize_str("double"),
            Self::Text => serializer.serialize_str("text"),
            Self::Binary => serializer.serialize_str("binary"),
            Self::Date => serializer.serialize_str("date"),
            Self::Time => serializer.serialize_str("time"),
            Self::Json => serializer.serialize_str("json"),
            Self::Map => serializer.serialize_str("map"),

            Self::Decimal { precision, scale } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "decimal")?;
                map.serialize_entry("precision", precision)?;
                map.serialize_entry("scale", scale)?;
                map.end()
            }
            Self::Char { length } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "char")?;
                map.serialize_entry("length", length)?;
                map.end()
            }
            Self::VarChar { length } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "var_char")?;
                map.serialize_entry("length", length)?;
                map.end()
            }
            Self::DateTime { fraction } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "date_time")?;
                map.serialize_entry("fraction", fraction)?;
                map.end()
            }
            Self::Array { element_type } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "array")?;
                map.serialize_entry("element_type", element_type)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{Error, MapAccess, Visitor};

        struct FieldTypeVisitor;

        impl<'de> Visitor<'de> for FieldTypeVisitor {
            type Value = FieldType;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or map representing a FieldType")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                simple_type(value).ok_or_else(|| E::custom(format!("unknown simple type: {value}")))
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut type_name: Option<String> = None;
                let mut fields: HashMap<String, serde_yaml::Value> = HashMap::new();

                while let Some(key) = map.next_key::<String>()? {
                    if key == "type" {
                        type_name = Some(map.next_value()?);
                    } else {
                        fields.insert(key, map.next_value()?);
                    }
                }

                let type_name = type_name.ok_or_else(|| M::Error::missing_field("type"))?;

                match type_name.as_str() {
                    "decimal" => {
                        let precision = get_field_required(&fields, "precision")?;
                        let scale = get_field_required(&fields, "scale")?;
                        Ok(FieldType::Decimal { precision, scale })
                    }
                    "char" => {
                        let length = get_field_required(&fields, "length")?;
                        Ok(FieldType::Char { length })
                    }
                    "var_char" | "varchar" => {
                        let length = get_field_required(&fields, "length")?;
                        Ok(FieldType::VarChar { length })
                    }
                    "date_time" | "datetime" => {
                        let fraction = get_field(&fields, "fraction").unwrap_or(3);
                        Ok(FieldType::DateTime { fraction })
                    }
                    "array" => {
                        let element_type: FieldType = get_field_required(&fields, "element_type")?;
                        Ok(FieldType::Array {
                            element_type: Box::new(element_type),
                        })
                    }
                    other => simple_type(other)
                        .ok_or_else(|| M::Error::custom(format!("unknown type: {type_name}"))),
                }
            }
        }

        deserializer.deserialize_any(FieldTypeVisitor)
    }
}

fn simple_type(value: &str) -> Option<FieldType> {
    let parsed = match value {
        "bool" | "boolean" => FieldType::Bool,
        "tiny_int" | "tinyint" => FieldType::TinyInt,
        "small_int" | "smallint" => FieldType::SmallInt,
        "int" => FieldType::Int,
        "big_int" | "bigint" => FieldType::BigInt,
        "float" => FieldType::Float,
        "double" => FieldType::Double,
        "text" | "string" => FieldType::Text,
        "binary" | "bytes" => FieldType::Binary,
        "date" => FieldType::Date,
        "time" => FieldType::Time,
        // Bare "date_time" defaults to millisecond precision
        "date_time" | "datetime" => FieldType::DateTime { fraction: 3 },
        "json" => FieldType::Json,
        "map" => FieldType::Map,
        _ => return None,
    };
    Some(parsed)
}

fn get_field<T: for<'de> Deserialize<'de>>(
    fields: &HashMap<String, serde_yaml::Value>,
    key: &str,
) -> Option<T> {
    fields
        .get(key)
        .and_then(|v| serde_yaml::from_value(v.clone()).ok())
}

fn get_field_required<T: for<'de> Deserialize<'de>, E: serde::de::Error>(
    fields: &HashMap<String, serde_yaml::Value>,
    key: &'static str,
) -> Result<T, E> {
    let value = fields.get(key).ok_or_else(|| E::missing_field(key))?;
    serde_yaml::from_value(value.clone())
        .map_err(|e| E::custom(format!("invalid field '{key}': {e}")))
}

impl FieldType {
    /// Create a new Decimal type with the given precision and scale.
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal { precision, scale }
    }

    /// Create a new VarChar type with the given length.
    pub fn varchar(length: u16) -> Self {
        Self::VarChar { length }
    }

    /// Create a new DateTime type with the given fractional precision.
    pub fn datetime(fraction: u8) -> Self {
        Self::DateTime { fraction }
    }

    /// Create a new Array type with the given element type.
    pub fn array(element_type: FieldType) -> Self {
        Self::Array {
            element_type: Box::new(element_type),
        }
    }

    /// The value kind a well-formed value of this type carries.
    ///
    /// Used to look up the codec whose target type names the column in DDL.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Bool => ValueKind::Boolean,
            Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt => ValueKind::Integer,
            Self::Float | Self::Double => ValueKind::Float,
            Self::Decimal { .. } => ValueKind::Decimal,
            Self::Char { .. } | Self::VarChar { .. } | Self::Text => ValueKind::String,
            Self::Binary => ValueKind::Binary,
            Self::Date => ValueKind::Date,
            Self::Time => ValueKind::Time,
            Self::DateTime { .. } => ValueKind::DateTime,
            Self::Json => ValueKind::Raw,
            Self::Array { .. } => ValueKind::Array,
            Self::Map => ValueKind::Map,
        }
    }

    /// Check if this type represents a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Int
                | Self::BigInt
                | Self::Float
                | Self::Double
                | Self::Decimal { .. }
        )
    }

    /// Check if this type represents a temporal type.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::DateTime { .. })
    }
}

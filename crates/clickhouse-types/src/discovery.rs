//! ClickHouse schema discovery.
//!
//! Builds [`Table`] descriptors from rows shaped like `system.columns`.

use batch_sink::DestinationDriver;
use indexmap::IndexMap;
use sync_codec::{NativeRow, NativeValue};
use sync_core::{Field, FieldType, Index, SchemaError, Table};
use tracing::{debug, warn};

use crate::ddl::quote_string;

/// One row of `system.columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRow {
    pub table: String,
    pub name: String,
    pub type_name: String,
    pub position: u64,
    pub is_in_primary_key: bool,
    pub is_in_sorting_key: bool,
    pub default_expression: Option<String>,
    pub comment: Option<String>,
}

impl ColumnRow {
    /// Read a row returned by [`columns_query`].
    pub fn from_native(row: &NativeRow) -> Option<ColumnRow> {
        Some(ColumnRow {
            table: text(row.get("table")?)?,
            name: text(row.get("name")?)?,
            type_name: text(row.get("type")?)?,
            position: number(row.get("position")?)?,
            is_in_primary_key: number(row.get("is_in_primary_key")?)? != 0,
            is_in_sorting_key: number(row.get("is_in_sorting_key")?)? != 0,
            default_expression: row.get("default_expression").and_then(text).filter(|s| !s.is_empty()),
            comment: row.get("comment").and_then(text).filter(|s| !s.is_empty()),
        })
    }
}

fn text(value: &NativeValue) -> Option<String> {
    match value {
        NativeValue::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn number(value: &NativeValue) -> Option<u64> {
    match value {
        NativeValue::UInt(u) => Some(*u),
        NativeValue::Int(i) => u64::try_from(*i).ok(),
        NativeValue::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

/// Query listing the columns of every table in `database`, or in the
/// session's current database.
pub fn columns_query(database: Option<&str>) -> String {
    let database = match database {
        Some(db) => quote_string(db),
        None => "currentDatabase()".to_string(),
    };
    format!(
        "SELECT table, name, type, position, is_in_primary_key, is_in_sorting_key, \
         default_expression, comment FROM system.columns WHERE database = {database} \
         ORDER BY table, position"
    )
}

/// Map a ClickHouse type name to a field type and its nullability.
pub fn parse_type(type_name: &str) -> (FieldType, bool) {
    let type_name = type_name.trim();
    if let Some(inner) = unwrap_call(type_name, "Nullable") {
        return (parse_type(inner).0, true);
    }
    if let Some(inner) = unwrap_call(type_name, "LowCardinality") {
        return parse_type(inner);
    }
    if let Some(inner) = unwrap_call(type_name, "Array") {
        return (FieldType::array(parse_type(inner).0), false);
    }
    if let Some(args) = unwrap_call(type_name, "Decimal") {
        let mut parts = args.split(',').map(|p| p.trim().parse::<u8>().ok());
        let precision = parts.next().flatten().unwrap_or(38);
        let scale = parts.next().flatten().unwrap_or(0);
        return (FieldType::decimal(precision, scale), false);
    }
    if let Some(args) = unwrap_call(type_name, "FixedString") {
        return match args.trim().parse() {
            Ok(length) => (FieldType::Char { length }, false),
            Err(_) => (FieldType::Text, false),
        };
    }
    if let Some(args) = unwrap_call(type_name, "DateTime64") {
        let fraction = args
            .split(',')
            .next()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(3);
        return (FieldType::datetime(fraction), false);
    }
    if type_name.starts_with("DateTime") {
        return (FieldType::datetime(0), false);
    }
    if type_name.starts_with("Map(") {
        return (FieldType::Map, false);
    }

    let field_type = match type_name {
        "Bool" => FieldType::Bool,
        "Int8" | "UInt8" => FieldType::TinyInt,
        "Int16" | "UInt16" => FieldType::SmallInt,
        "Int32" | "UInt32" => FieldType::Int,
        "Int64" | "UInt64" => FieldType::BigInt,
        "Float32" => FieldType::Float,
        "Float64" => FieldType::Double,
        "String" => FieldType::Text,
        "Date" | "Date32" => FieldType::Date,
        "JSON" | "Object('json')" => FieldType::Json,
        other => {
            warn!("Unknown ClickHouse type '{other}', treating as text");
            FieldType::Text
        }
    };
    (field_type, false)
}

/// The argument list of `name(...)`, if `type_name` is such a call.
fn unwrap_call<'a>(type_name: &'a str, name: &str) -> Option<&'a str> {
    type_name
        .strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Build tables from column rows, in first-seen table order.
///
/// Key ordinals follow column position. When the sorting key differs from
/// the primary key it becomes a secondary index named `sorting_key`.
pub fn tables_from_columns(rows: &[ColumnRow]) -> Result<Vec<Table>, SchemaError> {
    let mut grouped: IndexMap<&str, Vec<&ColumnRow>> = IndexMap::new();
    for row in rows {
        grouped.entry(row.table.as_str()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(table, mut columns)| {
            columns.sort_by_key(|c| c.position);

            let mut builder = Table::builder(table);
            let mut key_pos = 0;
            for column in &columns {
                let (data_type, nullable) = parse_type(&column.type_name);
                let mut field = if column.is_in_primary_key {
                    key_pos += 1;
                    Field {
                        primary_key_pos: Some(key_pos),
                        ..Field::key(&column.name, data_type)
                    }
                } else {
                    Field {
                        nullable,
                        ..Field::new(&column.name, data_type)
                    }
                };
                field.default_value = column.default_expression.clone();
                field.comment = column.comment.clone();
                builder = builder.field(field);
            }

            let primary: Vec<&str> = columns
                .iter()
                .filter(|c| c.is_in_primary_key)
                .map(|c| c.name.as_str())
                .collect();
            let sorting: Vec<&str> = columns
                .iter()
                .filter(|c| c.is_in_sorting_key)
                .map(|c| c.name.as_str())
                .collect();
            if !sorting.is_empty() && sorting != primary {
                builder = builder.index(Index::secondary("sorting_key", sorting));
            }

            debug!("Discovered table '{table}' with {} columns", columns.len());
            builder.build()
        })
        .collect()
}

/// Discover every table of `database` through `driver`.
pub async fn discover(
    driver: &dyn DestinationDriver,
    database: Option<&str>,
) -> anyhow::Result<Vec<Table>> {
    let rows = driver.query(&columns_query(database)).await?;
    let columns: Vec<ColumnRow> = rows
        .iter()
        .filter_map(|row| {
            let column = ColumnRow::from_native(row);
            if column.is_none() {
                warn!("Skipping unreadable system.columns row: {row:?}");
            }
            column
        })
        .collect();
    Ok(tables_from_columns(&columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table: &str, name: &str, type_name: &str, position: u64, pk: bool, sk: bool) -> ColumnRow {
        ColumnRow {
            table: table.to_string(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            position,
            is_in_primary_key: pk,
            is_in_sorting_key: sk,
            default_expression: None,
            comment: None,
        }
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(parse_type("Int64"), (FieldType::BigInt, false));
        assert_eq!(parse_type("Nullable(String)"), (FieldType::Text, true));
        assert_eq!(
            parse_type("LowCardinality(Nullable(String))"),
            (FieldType::Text, true)
        );
        assert_eq!(parse_type("Decimal(12, 2)"), (FieldType::decimal(12, 2), false));
        assert_eq!(parse_type("DateTime64(6, 'UTC')"), (FieldType::datetime(6), false));
        assert_eq!(parse_type("DateTime('UTC')"), (FieldType::datetime(0), false));
        assert_eq!(parse_type("FixedString(3)"), (FieldType::Char { length: 3 }, false));
        assert_eq!(
            parse_type("Array(Int32)"),
            (FieldType::array(FieldType::Int), false)
        );
        assert_eq!(parse_type("Map(String, UInt64)"), (FieldType::Map, false));
        assert_eq!(parse_type("IPv4"), (FieldType::Text, false));
    }

    #[test]
    fn test_tables_from_columns() {
        let rows = vec![
            column("orders", "total", "Nullable(Decimal(10, 2))", 3, false, false),
            column("orders", "id", "Int64", 1, true, true),
            column("orders", "created", "DateTime64(3)", 2, false, true),
            column("logs", "line", "String", 1, false, false),
        ];

        let tables = tables_from_columns(&rows).unwrap();
        assert_eq!(tables.len(), 2);

        let orders = &tables[0];
        assert_eq!(orders.id(), "orders");
        assert_eq!(orders.field_names(), vec!["id", "created", "total"]);
        assert_eq!(orders.primary_key_names(), vec!["id"]);
        assert!(orders.field("total").unwrap().nullable);
        assert_eq!(
            orders.sorting_index().unwrap().field_names(),
            vec!["id", "created"]
        );

        let logs = &tables[1];
        assert!(logs.primary_keys().is_empty());
        assert!(logs.sorting_index().is_none());
    }

    #[test]
    fn test_columns_query_scope() {
        assert!(columns_query(Some("sh'op")).contains("WHERE database = 'sh\\'op'"));
        assert!(columns_query(None).contains("WHERE database = currentDatabase()"));
    }

    #[test]
    fn test_column_row_from_native() {
        let row: NativeRow = [
            ("table", NativeValue::Text("t".into())),
            ("name", NativeValue::Text("id".into())),
            ("type", NativeValue::Text("UInt32".into())),
            ("position", NativeValue::UInt(1)),
            ("is_in_primary_key", NativeValue::UInt(1)),
            ("is_in_sorting_key", NativeValue::UInt(1)),
            ("default_expression", NativeValue::Text(String::new())),
            ("comment", NativeValue::Text("pk".into())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let column = ColumnRow::from_native(&row).unwrap();
        assert!(column.is_in_primary_key);
        assert_eq!(column.default_expression, None);
        assert_eq!(column.comment.as_deref(), Some("pk"));

        let mut broken = row.clone();
        broken.shift_remove("type");
        assert!(ColumnRow::from_native(&broken).is_none());
    }
}

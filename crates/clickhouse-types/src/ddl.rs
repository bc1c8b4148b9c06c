//! ClickHouse DDL generation.
//!
//! Column types come from the declared [`FieldType`], unless the codec
//! registered for the field's value kind names its own target type (booleans
//! stored as `UInt8`, documents and binary stored as `String`).

use std::sync::Arc;

use sync_codec::{CodecRegistry, ToDdl};
use sync_core::{Field, FieldType, Index, Table};

/// Quote an identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

pub(crate) fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// ClickHouse DDL generator.
#[derive(Debug, Clone)]
pub struct ClickhouseDdl {
    database: Option<String>,
    codecs: Arc<CodecRegistry>,
}

impl ClickhouseDdl {
    pub fn new(database: Option<String>, codecs: Arc<CodecRegistry>) -> Self {
        Self { database, codecs }
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// `db`.`table`, or just `table` without a database.
    pub fn qualified(&self, table: &str) -> String {
        match &self.database {
            Some(db) => format!("{}.{}", quote_ident(db), quote_ident(table)),
            None => quote_ident(table),
        }
    }

    /// Column type of a field, before nullability is applied.
    pub fn column_type(&self, field_type: &FieldType) -> String {
        match self.codecs.target_type(field_type.value_kind()) {
            Some(target) => target.to_string(),
            None => self.to_ddl(field_type),
        }
    }

    fn key_list(&self, names: &[&str]) -> String {
        names
            .iter()
            .map(|n| quote_ident(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `ALTER TABLE ... ADD INDEX` for a non-primary index.
    ///
    /// ClickHouse has no secondary B-tree indexes; a `minmax` data-skipping
    /// index over the same columns stands in for it. Returns `None` for the
    /// primary index, which is part of the table engine.
    pub fn add_index(&self, table: &Table, index: &Index) -> Option<String> {
        if index.primary {
            return None;
        }
        let columns = index.field_names();
        let name = index
            .name
            .clone()
            .unwrap_or_else(|| format!("idx_{}_{}", table.id(), columns.join("_")));
        let expr = if columns.len() == 1 {
            quote_ident(columns[0])
        } else {
            format!("({})", self.key_list(&columns))
        };
        Some(format!(
            "ALTER TABLE {} ADD INDEX IF NOT EXISTS {} {expr} TYPE minmax GRANULARITY 1",
            self.qualified(table.id()),
            quote_ident(&name)
        ))
    }
}

impl ToDdl for ClickhouseDdl {
    fn to_ddl(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Bool => "Bool".to_string(),

            FieldType::TinyInt => "Int8".to_string(),
            FieldType::SmallInt => "Int16".to_string(),
            FieldType::Int => "Int32".to_string(),
            FieldType::BigInt => "Int64".to_string(),

            FieldType::Float => "Float32".to_string(),
            FieldType::Double => "Float64".to_string(),
            FieldType::Decimal { precision, scale } => format!("Decimal({precision}, {scale})"),

            FieldType::Char { length } => format!("FixedString({length})"),
            FieldType::VarChar { .. } | FieldType::Text => "String".to_string(),
            FieldType::Binary => "String".to_string(),

            FieldType::Date => "Date32".to_string(),
            // No native time-of-day type
            FieldType::Time => "String".to_string(),
            FieldType::DateTime { fraction } => format!("DateTime64({})", (*fraction).min(9)),

            FieldType::Json | FieldType::Map => "String".to_string(),
            FieldType::Array { element_type } => format!("Array({})", self.to_ddl(element_type)),
        }
    }

    fn column_definition(&self, field: &Field) -> String {
        let base = self.column_type(&field.data_type);
        let column_type = if field.nullable && !field.primary_key && !base.starts_with("Array(") {
            format!("Nullable({base})")
        } else {
            base
        };

        let mut def = format!("{} {column_type}", quote_ident(&field.name));
        if let Some(default) = &field.default_value {
            def.push_str(&format!(" DEFAULT {default}"));
        }
        if let Some(comment) = &field.comment {
            def.push_str(&format!(" COMMENT {}", quote_string(comment)));
        }
        def
    }

    fn to_create_table(&self, table: &Table) -> String {
        let columns: Vec<String> = table
            .fields()
            .map(|field| self.column_definition(field))
            .collect();

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified(table.id()),
            columns.join(", ")
        );

        let keys = table.primary_key_names();
        if keys.is_empty() {
            sql.push_str(" ENGINE = MergeTree ORDER BY tuple()");
        } else {
            let keys = self.key_list(&keys);
            sql.push_str(&format!(
                " ENGINE = ReplacingMergeTree PRIMARY KEY ({keys}) ORDER BY ({keys})"
            ));
        }

        if let Some(comment) = table.comment() {
            sql.push_str(&format!(" COMMENT {}", quote_string(comment)));
        }
        sql
    }
}

//! Write statements for ClickHouse.

use std::sync::Arc;

use batch_sink::{
    InsertPolicy, Statement, StatementBuilder, UpdatePolicy, UpdateStrategy, WriteAction,
    WriteError, WritePolicy, WriteRequest,
};
use sync_codec::{NativeRow, NativeValue};
use sync_core::Table;

use crate::ddl::{quote_ident, quote_string};
use crate::ClickhouseDdl;

/// The policy ClickHouse declares: every insert and update is appended and
/// `ReplacingMergeTree` keeps the newest version of each key.
pub fn write_policy() -> WritePolicy {
    WritePolicy {
        insert: InsertPolicy::UpdateOnExists,
        update: UpdatePolicy::InsertOnNonExists,
        update_strategy: UpdateStrategy::Append,
        requires_before_image: false,
    }
}

/// Renders write actions for ClickHouse.
///
/// Inserts and updates go through the bulk append path. Deletes become
/// `ALTER TABLE ... DELETE WHERE` mutations on the key columns.
#[derive(Debug, Clone)]
pub struct ClickhouseStatements {
    ddl: Arc<ClickhouseDdl>,
}

impl ClickhouseStatements {
    pub fn new(ddl: Arc<ClickhouseDdl>) -> Self {
        Self { ddl }
    }

    /// `INSERT INTO ... VALUES` text for rows sent through the append path.
    ///
    /// Rows may be sparse; the column list is the union of their columns in
    /// first-seen order and missing values render as `DEFAULT`.
    pub fn render_insert(&self, table: &str, rows: &[NativeRow]) -> String {
        let mut columns: Vec<&str> = Vec::new();
        for row in rows {
            for name in row.keys() {
                if !columns.contains(&name.as_str()) {
                    columns.push(name);
                }
            }
        }

        let values: Vec<String> = rows
            .iter()
            .map(|row| {
                let literals: Vec<String> = columns
                    .iter()
                    .map(|c| match row.get(*c) {
                        Some(value) => literal(value),
                        None => "DEFAULT".to_string(),
                    })
                    .collect();
                format!("({})", literals.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.ddl.qualified(table),
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            values.join(", ")
        )
    }

    fn delete(&self, table: &Table, key: &NativeRow) -> Result<String, String> {
        if key.is_empty() {
            return Err("no key values to match".to_string());
        }
        let predicate = key
            .iter()
            .map(|(name, value)| match value {
                NativeValue::Null => format!("{} IS NULL", quote_ident(name)),
                value => format!("{} = {}", quote_ident(name), literal(value)),
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        Ok(format!(
            "ALTER TABLE {} DELETE WHERE {predicate}",
            self.ddl.qualified(table.id())
        ))
    }
}

/// A value literal with ClickHouse string escaping.
fn literal(value: &NativeValue) -> String {
    value.to_sql_literal_with(quote_string)
}

impl StatementBuilder for ClickhouseStatements {
    fn build(&self, table: &Table, request: WriteRequest<'_>) -> batch_sink::Result<Statement> {
        match request.action {
            WriteAction::Insert
            | WriteAction::Upsert
            | WriteAction::InsertIgnore
            | WriteAction::Update => Ok(Statement::Append(request.row.clone())),
            WriteAction::Delete => self
                .delete(table, request.key)
                .map(Statement::Sql)
                .map_err(|reason| WriteError::Statement {
                    action: request.action,
                    table: table.id().to_string(),
                    reason,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_registry;
    use sync_core::{Field, FieldType, RecordOp};

    fn statements() -> ClickhouseStatements {
        ClickhouseStatements::new(Arc::new(ClickhouseDdl::new(
            Some("db".to_string()),
            Arc::new(codec_registry()),
        )))
    }

    fn table() -> Table {
        Table::builder("t")
            .field(Field::key("id", FieldType::BigInt))
            .field(Field::key("kind", FieldType::Text))
            .field(Field::new("v", FieldType::Text))
            .build()
            .unwrap()
    }

    fn native(pairs: &[(&str, NativeValue)]) -> NativeRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_policy_appends_updates() {
        let policy = write_policy();
        assert_eq!(policy.actions_for(RecordOp::Update), vec![WriteAction::Insert]);
        assert_eq!(policy.actions_for(RecordOp::Insert), vec![WriteAction::Upsert]);
    }

    #[test]
    fn test_writes_are_appends() {
        let row = native(&[("id", NativeValue::Int(1))]);
        let statement = statements()
            .build(
                &table(),
                WriteRequest {
                    action: WriteAction::Upsert,
                    row: &row,
                    key: &row,
                },
            )
            .unwrap();
        assert_eq!(statement, Statement::Append(row));
    }

    #[test]
    fn test_delete_by_key() {
        let key = native(&[
            ("id", NativeValue::Int(7)),
            ("kind", NativeValue::Text("a'b".to_string())),
        ]);
        let statement = statements()
            .build(
                &table(),
                WriteRequest {
                    action: WriteAction::Delete,
                    row: &NativeRow::new(),
                    key: &key,
                },
            )
            .unwrap();
        assert_eq!(
            statement,
            Statement::Sql(
                "ALTER TABLE `db`.`t` DELETE WHERE `id` = 7 AND `kind` = 'a\\'b'".to_string()
            )
        );
    }

    #[test]
    fn test_trailing_backslash_stays_terminated() {
        let key = native(&[
            ("id", NativeValue::Int(1)),
            ("kind", NativeValue::Text("abc\\".to_string())),
        ]);
        let statement = statements()
            .build(
                &table(),
                WriteRequest {
                    action: WriteAction::Delete,
                    row: &NativeRow::new(),
                    key: &key,
                },
            )
            .unwrap();
        assert_eq!(
            statement,
            Statement::Sql(
                r"ALTER TABLE `db`.`t` DELETE WHERE `id` = 1 AND `kind` = 'abc\\'".to_string()
            )
        );

        let rows = vec![native(&[("v", NativeValue::Text(r"x\' OR 1=1 --".to_string()))])];
        assert_eq!(
            statements().render_insert("t", &rows),
            r"INSERT INTO `db`.`t` (`v`) VALUES ('x\\\' OR 1=1 --')"
        );
    }

    #[test]
    fn test_delete_without_key_fails() {
        let err = statements()
            .build(
                &table(),
                WriteRequest {
                    action: WriteAction::Delete,
                    row: &NativeRow::new(),
                    key: &NativeRow::new(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, WriteError::Statement { .. }));
    }

    #[test]
    fn test_render_sparse_insert() {
        let rows = vec![
            native(&[("id", NativeValue::Int(1)), ("v", NativeValue::Text("x".into()))]),
            native(&[("id", NativeValue::Int(2)), ("kind", NativeValue::Null)]),
        ];
        assert_eq!(
            statements().render_insert("t", &rows),
            "INSERT INTO `db`.`t` (`id`, `v`, `kind`) VALUES (1, 'x', DEFAULT), (2, DEFAULT, NULL)"
        );
    }
}

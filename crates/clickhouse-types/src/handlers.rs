//! Schema-change handlers for ClickHouse.

use std::sync::Arc;

use sync_codec::{DdlDispatcher, DdlError, ToDdl};
use sync_core::{DdlKind, SchemaChangeEvent, SchemaError};

use crate::ddl::quote_ident;
use crate::ClickhouseDdl;

/// Dispatcher with a handler for every schema-change kind.
///
/// Use [`DdlDispatcher::without`] to model a destination that cannot apply
/// some kind of change.
pub fn ddl_dispatcher(ddl: Arc<ClickhouseDdl>) -> DdlDispatcher {
    let mut dispatcher = DdlDispatcher::new();

    let d = Arc::clone(&ddl);
    dispatcher.register(DdlKind::NewField, move |event| match event {
        SchemaChangeEvent::NewField { table, fields } => {
            if fields.is_empty() {
                return Err(invalid(event, "no fields to add"));
            }
            Ok(fields
                .iter()
                .map(|field| {
                    format!(
                        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
                        d.qualified(table.id()),
                        d.column_definition(field)
                    )
                })
                .collect())
        }
        other => Err(mismatch(DdlKind::NewField, other)),
    });

    let d = Arc::clone(&ddl);
    dispatcher.register(DdlKind::AlterFieldName, move |event| match event {
        SchemaChangeEvent::AlterFieldName { table, from, to } => {
            let field = table.field(from).ok_or_else(|| SchemaError::FieldNotFound {
                table: table.id().to_string(),
                field: from.clone(),
            })?;
            if field.primary_key {
                return Err(invalid(event, "key columns cannot be renamed"));
            }
            Ok(vec![format!(
                "ALTER TABLE {} RENAME COLUMN IF EXISTS {} TO {}",
                d.qualified(table.id()),
                quote_ident(from),
                quote_ident(to)
            )])
        }
        other => Err(mismatch(DdlKind::AlterFieldName, other)),
    });

    let d = Arc::clone(&ddl);
    dispatcher.register(DdlKind::AlterFieldAttributes, move |event| match event {
        SchemaChangeEvent::AlterFieldAttributes { table, field } => {
            if table.field(&field.name).is_some_and(|f| f.primary_key) {
                return Err(invalid(event, "key columns cannot be modified"));
            }
            Ok(vec![format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                d.qualified(table.id()),
                d.column_definition(field)
            )])
        }
        other => Err(mismatch(DdlKind::AlterFieldAttributes, other)),
    });

    let d = Arc::clone(&ddl);
    dispatcher.register(DdlKind::DropField, move |event| match event {
        SchemaChangeEvent::DropField { table, field } => Ok(vec![format!(
            "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
            d.qualified(table.id()),
            quote_ident(field)
        )]),
        other => Err(mismatch(DdlKind::DropField, other)),
    });

    let d = Arc::clone(&ddl);
    dispatcher.register(DdlKind::CreateTable, move |event| match event {
        SchemaChangeEvent::CreateTable { table } => Ok(vec![d.to_create_table(table)]),
        other => Err(mismatch(DdlKind::CreateTable, other)),
    });

    let d = Arc::clone(&ddl);
    dispatcher.register(DdlKind::DropTable, move |event| match event {
        SchemaChangeEvent::DropTable { table } => Ok(vec![format!(
            "DROP TABLE IF EXISTS {}",
            d.qualified(table.id())
        )]),
        other => Err(mismatch(DdlKind::DropTable, other)),
    });

    dispatcher.register(DdlKind::CreateIndex, move |event| match event {
        SchemaChangeEvent::CreateIndex { table, indexes } => Ok(indexes
            .iter()
            .filter_map(|index| ddl.add_index(table, index))
            .collect()),
        other => Err(mismatch(DdlKind::CreateIndex, other)),
    });

    dispatcher
}

fn invalid(event: &SchemaChangeEvent, reason: &str) -> DdlError {
    DdlError::InvalidEvent {
        kind: event.kind(),
        table: event.table().id().to_string(),
        reason: reason.to_string(),
    }
}

fn mismatch(expected: DdlKind, event: &SchemaChangeEvent) -> DdlError {
    DdlError::KindMismatch {
        expected,
        found: event.kind(),
    }
}

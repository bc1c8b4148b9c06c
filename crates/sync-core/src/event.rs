//! Row mutation and schema change events.

use crate::schema::{Field, Index, SchemaError, Table};
use crate::values::TypedValue;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A row payload: column name to value, in column order.
pub type Row = IndexMap<String, TypedValue>;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("{op} event for table '{table}' has no {image} image")]
    MissingImage {
        table: String,
        op: RecordOp,
        image: &'static str,
    },

    #[error("Event targets table '{event_table}' but was applied to '{table}'")]
    TableMismatch { table: String, event_table: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOp {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for RecordOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordOp::Insert => "insert",
            RecordOp::Update => "update",
            RecordOp::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A single row mutation.
///
/// `reference_time` is the time the change happened at the origin, not the
/// time it was processed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    Insert {
        table: String,
        reference_time: DateTime<Utc>,
        after: Row,
    },
    /// At least one image is present. Sources that do not capture
    /// before-images leave `before` empty.
    Update {
        table: String,
        reference_time: DateTime<Utc>,
        before: Option<Row>,
        after: Option<Row>,
    },
    Delete {
        table: String,
        reference_time: DateTime<Utc>,
        before: Row,
    },
}

impl RecordEvent {
    pub fn insert(table: impl Into<String>, reference_time: DateTime<Utc>, after: Row) -> Self {
        RecordEvent::Insert {
            table: table.into(),
            reference_time,
            after,
        }
    }

    /// Build an update; fails when neither image is present.
    pub fn update(
        table: impl Into<String>,
        reference_time: DateTime<Utc>,
        before: Option<Row>,
        after: Option<Row>,
    ) -> Result<Self> {
        let table = table.into();
        if before.is_none() && after.is_none() {
            return Err(EventError::MissingImage {
                table,
                op: RecordOp::Update,
                image: "before or after",
            });
        }
        Ok(RecordEvent::Update {
            table,
            reference_time,
            before,
            after,
        })
    }

    pub fn delete(table: impl Into<String>, reference_time: DateTime<Utc>, before: Row) -> Self {
        RecordEvent::Delete {
            table: table.into(),
            reference_time,
            before,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            RecordEvent::Insert { table, .. }
            | RecordEvent::Update { table, .. }
            | RecordEvent::Delete { table, .. } => table,
        }
    }

    pub fn op(&self) -> RecordOp {
        match self {
            RecordEvent::Insert { .. } => RecordOp::Insert,
            RecordEvent::Update { .. } => RecordOp::Update,
            RecordEvent::Delete { .. } => RecordOp::Delete,
        }
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        match self {
            RecordEvent::Insert { reference_time, .. }
            | RecordEvent::Update { reference_time, .. }
            | RecordEvent::Delete { reference_time, .. } => *reference_time,
        }
    }

    pub fn before(&self) -> Option<&Row> {
        match self {
            RecordEvent::Insert { .. } => None,
            RecordEvent::Update { before, .. } => before.as_ref(),
            RecordEvent::Delete { before, .. } => Some(before),
        }
    }

    pub fn after(&self) -> Option<&Row> {
        match self {
            RecordEvent::Insert { after, .. } => Some(after),
            RecordEvent::Update { after, .. } => after.as_ref(),
            RecordEvent::Delete { .. } => None,
        }
    }

    /// The image that describes the row's state after this event, falling
    /// back to the before-image for deletes and after-less updates.
    pub fn image(&self) -> Option<&Row> {
        self.after().or_else(|| self.before())
    }

    /// Primary-key values of the affected row, in key order.
    ///
    /// Reads the after-image first and the before-image for any key column
    /// the after-image lacks. Returns `None` if a key column is missing from
    /// both.
    pub fn key(&self, table: &Table) -> Option<Vec<(String, TypedValue)>> {
        let after = self.after();
        let before = self.before();
        table
            .primary_keys()
            .into_iter()
            .map(|field| {
                after
                    .and_then(|row| row.get(&field.name))
                    .or_else(|| before.and_then(|row| row.get(&field.name)))
                    .map(|value| (field.name.clone(), value.clone()))
            })
            .collect()
    }
}

// ============================================================================
// Schema change events
// ============================================================================

/// Concrete kind of a [`SchemaChangeEvent`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlKind {
    NewField,
    AlterFieldName,
    AlterFieldAttributes,
    DropField,
    CreateTable,
    DropTable,
    CreateIndex,
}

impl DdlKind {
    pub const ALL: [DdlKind; 7] = [
        DdlKind::NewField,
        DdlKind::AlterFieldName,
        DdlKind::AlterFieldAttributes,
        DdlKind::DropField,
        DdlKind::CreateTable,
        DdlKind::DropTable,
        DdlKind::CreateIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DdlKind::NewField => "new_field",
            DdlKind::AlterFieldName => "alter_field_name",
            DdlKind::AlterFieldAttributes => "alter_field_attributes",
            DdlKind::DropField => "drop_field",
            DdlKind::CreateTable => "create_table",
            DdlKind::DropTable => "drop_table",
            DdlKind::CreateIndex => "create_index",
        }
    }
}

impl std::fmt::Display for DdlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema change. Each variant carries the descriptor of the table as it
/// was before the change plus whatever the change introduces.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChangeEvent {
    NewField { table: Table, fields: Vec<Field> },
    AlterFieldName { table: Table, from: String, to: String },
    AlterFieldAttributes { table: Table, field: Field },
    DropField { table: Table, field: String },
    CreateTable { table: Table },
    DropTable { table: Table },
    CreateIndex { table: Table, indexes: Vec<Index> },
}

impl SchemaChangeEvent {
    pub fn kind(&self) -> DdlKind {
        match self {
            SchemaChangeEvent::NewField { .. } => DdlKind::NewField,
            SchemaChangeEvent::AlterFieldName { .. } => DdlKind::AlterFieldName,
            SchemaChangeEvent::AlterFieldAttributes { .. } => DdlKind::AlterFieldAttributes,
            SchemaChangeEvent::DropField { .. } => DdlKind::DropField,
            SchemaChangeEvent::CreateTable { .. } => DdlKind::CreateTable,
            SchemaChangeEvent::DropTable { .. } => DdlKind::DropTable,
            SchemaChangeEvent::CreateIndex { .. } => DdlKind::CreateIndex,
        }
    }

    pub fn table(&self) -> &Table {
        match self {
            SchemaChangeEvent::NewField { table, .. }
            | SchemaChangeEvent::AlterFieldName { table, .. }
            | SchemaChangeEvent::AlterFieldAttributes { table, .. }
            | SchemaChangeEvent::DropField { table, .. }
            | SchemaChangeEvent::CreateTable { table }
            | SchemaChangeEvent::DropTable { table }
            | SchemaChangeEvent::CreateIndex { table, .. } => table,
        }
    }

    /// Bring a cached descriptor of the same table up to date after the
    /// change has been applied at the destination.
    ///
    /// `CreateTable` replaces the cached descriptor; `DropTable` leaves it
    /// untouched, callers evict it themselves.
    pub fn apply_to(&self, cached: &mut Table) -> Result<()> {
        if cached.id() != self.table().id() {
            return Err(EventError::TableMismatch {
                table: cached.id().to_string(),
                event_table: self.table().id().to_string(),
            });
        }

        match self {
            SchemaChangeEvent::NewField { fields, .. } => {
                for field in fields {
                    cached.add_field(field.clone())?;
                }
            }
            SchemaChangeEvent::AlterFieldName { from, to, .. } => {
                cached.rename_field(from, to)?;
            }
            SchemaChangeEvent::AlterFieldAttributes { field, .. } => {
                cached.alter_field(field.clone())?;
            }
            SchemaChangeEvent::DropField { field, .. } => {
                cached.drop_field(field)?;
            }
            SchemaChangeEvent::CreateTable { table } => {
                *cached = table.clone();
            }
            SchemaChangeEvent::DropTable { .. } => {}
            SchemaChangeEvent::CreateIndex { indexes, .. } => {
                for index in indexes.iter().filter(|i| !i.primary) {
                    cached.add_index(index.clone())?;
                }
            }
        }
        Ok(())
    }
}

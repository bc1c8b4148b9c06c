//! DDL generation and schema-change dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use sync_core::{DdlKind, Field, FieldType, SchemaChangeEvent, Table};

use crate::DdlError;

/// Trait for generating destination column types and table DDL.
pub trait ToDdl {
    /// Convert a declared field type to a destination column type.
    fn to_ddl(&self, field_type: &FieldType) -> String;

    /// Full column definition (name, type, nullability, default).
    fn column_definition(&self, field: &Field) -> String;

    /// Generate a complete CREATE TABLE statement.
    fn to_create_table(&self, table: &Table) -> String;
}

/// Translates one schema change into destination statements.
///
/// Handlers only build statement text; executing it is up to the caller.
pub type DdlHandler =
    Arc<dyn Fn(&SchemaChangeEvent) -> Result<Vec<String>, DdlError> + Send + Sync>;

/// Routes each [`SchemaChangeEvent`] to the handler registered for its kind.
#[derive(Clone, Default)]
pub struct DdlDispatcher {
    handlers: HashMap<DdlKind, DdlHandler>,
}

/// Statements produced by [`DdlDispatcher::dispatch_all`], plus the events
/// that were skipped.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub statements: Vec<String>,
    pub skipped: Vec<(DdlKind, DdlError)>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl DdlDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any earlier handler.
    pub fn register<F>(&mut self, kind: DdlKind, handler: F) -> &mut Self
    where
        F: Fn(&SchemaChangeEvent) -> Result<Vec<String>, DdlError> + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// The same dispatcher with the handler for `kind` removed.
    pub fn without(mut self, kind: DdlKind) -> Self {
        self.handlers.remove(&kind);
        self
    }

    pub fn supports(&self, kind: DdlKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<DdlKind> {
        DdlKind::ALL
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .collect()
    }

    /// Translate one event.
    pub fn dispatch(&self, event: &SchemaChangeEvent) -> Result<Vec<String>, DdlError> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(DdlError::UnsupportedKind(kind))?;
        handler(event)
    }

    /// Translate events in order. A failing event is recorded and skipped;
    /// the rest are still translated.
    pub fn dispatch_all<'a>(
        &self,
        events: impl IntoIterator<Item = &'a SchemaChangeEvent>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            match self.dispatch(event) {
                Ok(statements) => report.statements.extend(statements),
                Err(e) => {
                    tracing::warn!(
                        "Skipping {} on table '{}': {e}",
                        event.kind(),
                        event.table().id()
                    );
                    report.skipped.push((event.kind(), e));
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for DdlDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdlDispatcher")
            .field("kinds", &self.kinds())
            .finish()
    }
}

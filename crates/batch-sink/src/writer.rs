//! Per-table batch writers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sync_codec::{CodecRegistry, NativeRow};
use sync_core::{Field, RecordEvent, RecordOp, Row, Table};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    DestinationDriver, EventOutcome, Result, Statement, StatementBuilder, WriteError,
    WriteListResult, WritePolicy, WriteRequest,
};

/// Batch-write engine for one destination.
///
/// Hands out at most one [`TableWriter`] per table at a time; writers for
/// different tables run concurrently.
pub struct BatchWriter {
    driver: Arc<dyn DestinationDriver>,
    codecs: Arc<CodecRegistry>,
    builder: Arc<dyn StatementBuilder>,
    policy: WritePolicy,
    table_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BatchWriter {
    pub fn new(
        driver: Arc<dyn DestinationDriver>,
        codecs: Arc<CodecRegistry>,
        builder: Arc<dyn StatementBuilder>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            driver,
            codecs,
            builder,
            policy,
            table_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &WritePolicy {
        &self.policy
    }

    pub fn driver(&self) -> &Arc<dyn DestinationDriver> {
        &self.driver
    }

    fn table_lock(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .table_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(table.to_string()).or_default())
    }

    /// Wait until no other writer holds `table`, then return its writer.
    pub async fn writer(&self, table: &Table) -> TableWriter<'_> {
        let guard = self.table_lock(table.id()).lock_owned().await;
        debug!("Acquired writer for table '{}'", table.id());
        TableWriter {
            engine: self,
            table: table.clone(),
            statements: Vec::new(),
            result: WriteListResult::default(),
            _guard: guard,
        }
    }

    /// Stage and commit `events` in one go.
    pub async fn write(
        &self,
        table: &Table,
        events: &[RecordEvent],
        cancel: &CancellationToken,
    ) -> Result<WriteListResult> {
        let mut writer = self.writer(table).await;
        writer.add_to_batch(events, cancel)?;
        writer.commit().await
    }

    /// Execute statements produced outside the write path, such as DDL.
    pub async fn execute_all(&self, statements: &[String]) -> Result<()> {
        for statement in statements {
            debug!("Executing: {statement}");
            self.driver
                .execute(statement)
                .await
                .map_err(WriteError::Driver)?;
        }
        if !statements.is_empty() {
            self.driver.commit().await.map_err(WriteError::Driver)?;
        }
        Ok(())
    }
}

/// Exclusive writer for one table.
///
/// Dropping a writer without committing discards what was staged.
pub struct TableWriter<'a> {
    engine: &'a BatchWriter,
    table: Table,
    statements: Vec<Statement>,
    result: WriteListResult,
    _guard: OwnedMutexGuard<()>,
}

impl TableWriter<'_> {
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Convert and stage `events` in order.
    ///
    /// `cancel` is checked before each event. Once it fires the writer
    /// discards everything staged so far and returns `Interrupted`.
    /// Per-event conversion failures are recorded as [`EventOutcome::Failed`]
    /// and do not stop the batch.
    pub fn add_to_batch(
        &mut self,
        events: &[RecordEvent],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let total = events.len();
        for (processed, event) in events.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Write to '{}' interrupted, discarding {} staged statements",
                    self.table.id(),
                    self.statements.len()
                );
                self.statements.clear();
                self.result = WriteListResult::default();
                return Err(WriteError::Interrupted {
                    table: self.table.id().to_string(),
                    processed,
                    total,
                });
            }

            let outcome = match self.stage(event) {
                Ok(Some((statements, fallback))) => {
                    self.statements.extend(statements);
                    match event.op() {
                        RecordOp::Insert => self.result.inserted += 1,
                        RecordOp::Update => self.result.modified += 1,
                        RecordOp::Delete => self.result.removed += 1,
                    }
                    EventOutcome::Applied { fallback }
                }
                Ok(None) => {
                    debug!("Dropped {} on '{}': empty row", event.op(), self.table.id());
                    EventOutcome::Dropped
                }
                Err(e) => {
                    warn!("Skipping {} on '{}': {e}", event.op(), self.table.id());
                    EventOutcome::Failed(e.to_string())
                }
            };
            self.result.outcomes.push(outcome);
        }
        Ok(())
    }

    /// Send the staged statements and commit them.
    ///
    /// Consecutive appends are sent as one bulk append; statement order is
    /// preserved.
    pub async fn commit(mut self) -> Result<WriteListResult> {
        let statements = std::mem::take(&mut self.statements);
        if statements.is_empty() {
            return Ok(self.result);
        }

        let driver = &self.engine.driver;
        let table = self.table.id();
        let mut rows = Vec::new();
        for statement in statements {
            match statement {
                Statement::Append(row) => rows.push(row),
                Statement::Sql(sql) => {
                    flush_appends(driver.as_ref(), table, &mut rows).await?;
                    debug!("Executing: {sql}");
                    driver.execute(&sql).await.map_err(WriteError::Driver)?;
                }
            }
        }
        flush_appends(driver.as_ref(), table, &mut rows).await?;
        driver.commit().await.map_err(WriteError::Driver)?;

        info!("Committed batch to '{table}': {}", self.result);
        Ok(self.result)
    }

    fn stage(&self, event: &RecordEvent) -> Result<Option<(Vec<Statement>, bool)>> {
        if event.table() != self.table.id() {
            return Err(WriteError::TableMismatch {
                table: self.table.id().to_string(),
                event_table: event.table().to_string(),
            });
        }

        let op = event.op();
        let policy = &self.engine.policy;
        if op == RecordOp::Update && policy.requires_before_image && event.before().is_none() {
            return Err(WriteError::MissingBeforeImage {
                table: self.table.id().to_string(),
            });
        }

        let (row, row_fallback) = match event.after() {
            Some(after) => self.convert_row(after)?,
            None => (NativeRow::new(), false),
        };
        let key_image = match op {
            RecordOp::Insert => event.after(),
            RecordOp::Update => event.before().or(event.after()),
            RecordOp::Delete => event.before(),
        };
        let (key, key_fallback) = match key_image {
            Some(image) => self.convert_key(image)?,
            None => (NativeRow::new(), false),
        };

        let target = if op == RecordOp::Delete { &key } else { &row };
        if target.is_empty() {
            return Ok(None);
        }

        let statements = policy
            .actions_for(op)
            .into_iter()
            .map(|action| {
                self.engine.builder.build(
                    &self.table,
                    WriteRequest {
                        action,
                        row: &row,
                        key: &key,
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some((statements, row_fallback || key_fallback)))
    }

    /// Convert the declared fields present in `image`. Undeclared columns are
    /// ignored.
    fn convert_row(&self, image: &Row) -> Result<(NativeRow, bool)> {
        self.convert_fields(image, self.table.fields())
    }

    /// Primary-key values of `image`, or the whole row for keyless tables.
    fn convert_key(&self, image: &Row) -> Result<(NativeRow, bool)> {
        let keys = self.table.primary_keys();
        if keys.is_empty() {
            return self.convert_row(image);
        }
        self.convert_fields(image, keys)
    }

    fn convert_fields<'f>(
        &self,
        image: &Row,
        fields: impl IntoIterator<Item = &'f Field>,
    ) -> Result<(NativeRow, bool)> {
        let mut row = NativeRow::with_capacity(image.len());
        let mut fallback = false;
        for field in fields {
            let Some(value) = image.get(&field.name) else {
                continue;
            };
            let conversion = self
                .engine
                .codecs
                .convert_field(value, &field.data_type)
                .map_err(|source| WriteError::Conversion {
                    field: field.name.clone(),
                    source,
                })?;
            fallback |= conversion.fallback;
            row.insert(field.name.clone(), conversion.value);
        }
        Ok((row, fallback))
    }
}

async fn flush_appends(
    driver: &dyn DestinationDriver,
    table: &str,
    rows: &mut Vec<NativeRow>,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    debug!("Appending {} rows to '{table}'", rows.len());
    driver.append(table, rows).await.map_err(WriteError::Driver)?;
    rows.clear();
    Ok(())
}

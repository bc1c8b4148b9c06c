//! ClickHouse destination connector.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use batch_sink::{BatchWriter, DestinationDriver, WritePolicy};
use connector::{Capability, CapabilityRegistry, Connector, Invocation, Outcome};
use sync_codec::{DdlDispatcher, NativeValue};
use sync_core::{DdlKind, RecordEvent, SchemaChangeEvent, Table};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{codec_registry, ddl_dispatcher, discover, write_policy, ClickhouseDdl, ClickhouseStatements};

/// Destination connector writing to ClickHouse through a [`DestinationDriver`].
pub struct ClickhouseConnector {
    ddl: Arc<ClickhouseDdl>,
    dispatcher: DdlDispatcher,
    writer: BatchWriter,
    cancel: CancellationToken,
}

impl ClickhouseConnector {
    pub fn new(driver: Arc<dyn DestinationDriver>, database: Option<String>) -> Self {
        Self::with_policy(driver, database, write_policy())
    }

    /// Connector applying `policy` instead of the default
    /// [`write_policy`].
    pub fn with_policy(
        driver: Arc<dyn DestinationDriver>,
        database: Option<String>,
        policy: WritePolicy,
    ) -> Self {
        let codecs = Arc::new(codec_registry());
        let ddl = Arc::new(ClickhouseDdl::new(database, Arc::clone(&codecs)));
        let statements = Arc::new(ClickhouseStatements::new(Arc::clone(&ddl)));
        Self {
            dispatcher: ddl_dispatcher(Arc::clone(&ddl)),
            writer: BatchWriter::new(driver, codecs, statements, policy),
            ddl,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the schema-change dispatcher, e.g. one built with
    /// [`DdlDispatcher::without`].
    pub fn with_dispatcher(mut self, dispatcher: DdlDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn ddl(&self) -> &ClickhouseDdl {
        &self.ddl
    }

    pub fn writer(&self) -> &BatchWriter {
        &self.writer
    }

    /// Token checked before each event of a write. Cancelling it interrupts
    /// in-flight batches and every later one.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn driver(&self) -> &dyn DestinationDriver {
        self.writer.driver().as_ref()
    }

    async fn execute(&self, statements: Vec<String>) -> anyhow::Result<Outcome> {
        self.writer.execute_all(&statements).await?;
        Ok(Outcome::Statements(statements))
    }

    /// CREATE TABLE followed by the table's secondary indexes, both
    /// translated by the dispatcher.
    async fn create_table(&self, table: Table) -> anyhow::Result<Outcome> {
        let indexes = table.indexes().to_vec();
        let mut statements = self
            .dispatcher
            .dispatch(&SchemaChangeEvent::CreateTable { table: table.clone() })?;
        if self.dispatcher.supports(DdlKind::CreateIndex) {
            statements.extend(self.dispatcher.dispatch(&SchemaChangeEvent::CreateIndex {
                table: table.clone(),
                indexes,
            })?);
        } else if indexes.iter().any(|index| !index.primary) {
            warn!(
                "Skipping secondary indexes of '{}': no handler for {}",
                table.id(),
                DdlKind::CreateIndex
            );
        }
        info!("Creating table '{}'", table.id());
        self.execute(statements).await
    }

    async fn write_records(&self, table: Table, events: Vec<RecordEvent>) -> anyhow::Result<Outcome> {
        let result = self.writer.write(&table, &events, &self.cancel).await?;
        debug!("Wrote {} events to '{}': {result}", events.len(), table.id());
        Ok(Outcome::Written(result))
    }

    async fn batch_count(&self, table: &str) -> anyhow::Result<Outcome> {
        let rows = self
            .driver()
            .query(&format!("SELECT count() AS cnt FROM {}", self.ddl.qualified(table)))
            .await?;
        let count = match rows.first().and_then(|row| row.get("cnt")) {
            Some(NativeValue::UInt(n)) => *n,
            Some(NativeValue::Int(n)) => u64::try_from(*n)?,
            other => bail!("Unexpected count result for '{table}': {other:?}"),
        };
        Ok(Outcome::Count(count))
    }

    async fn schema_change(&self, kind: DdlKind, event: SchemaChangeEvent) -> anyhow::Result<Outcome> {
        if event.kind() != kind {
            bail!("Expected a {kind} event, got {}", event.kind());
        }
        let statements = self.dispatcher.dispatch(&event)?;
        self.execute(statements).await
    }

    async fn table_info(&self, table: &str) -> anyhow::Result<Outcome> {
        let tables = discover(self.driver(), self.ddl.database()).await?;
        Ok(Outcome::Table(tables.into_iter().find(|t| t.id() == table)))
    }

    async fn invoke(self: Arc<Self>, capability: Capability, invocation: Invocation) -> anyhow::Result<Outcome> {
        match (capability, invocation) {
            (Capability::CreateTable, Invocation::Table(table)) => self.create_table(table).await,
            (Capability::DropTable, Invocation::Table(table)) => {
                self.schema_change(DdlKind::DropTable, SchemaChangeEvent::DropTable { table })
                    .await
            }
            (Capability::ClearTable, Invocation::Table(table)) => {
                self.execute(vec![format!(
                    "TRUNCATE TABLE IF EXISTS {}",
                    self.ddl.qualified(table.id())
                )])
                .await
            }
            (Capability::WriteRecord, Invocation::Records { table, events }) => {
                self.write_records(table, events).await
            }
            (Capability::BatchCount, Invocation::TableName(table)) => self.batch_count(&table).await,
            (Capability::BatchCount, Invocation::Table(table)) => self.batch_count(table.id()).await,
            (Capability::NewField, Invocation::SchemaChange(event)) => {
                self.schema_change(DdlKind::NewField, event).await
            }
            (Capability::AlterFieldName, Invocation::SchemaChange(event)) => {
                self.schema_change(DdlKind::AlterFieldName, event).await
            }
            (Capability::AlterFieldAttributes, Invocation::SchemaChange(event)) => {
                self.schema_change(DdlKind::AlterFieldAttributes, event).await
            }
            (Capability::DropField, Invocation::SchemaChange(event)) => {
                self.schema_change(DdlKind::DropField, event).await
            }
            (Capability::CreateIndex, Invocation::SchemaChange(event)) => {
                self.schema_change(DdlKind::CreateIndex, event).await
            }
            (Capability::ExecuteCommand, Invocation::Command(command)) => self.execute(vec![command]).await,
            (Capability::GetTableInfo, Invocation::TableName(table)) => self.table_info(&table).await,
            (capability, invocation) => Err(anyhow!(
                "Invalid arguments for {capability}: {}",
                invocation_name(&invocation)
            )),
        }
    }
}

fn invocation_name(invocation: &Invocation) -> &'static str {
    match invocation {
        Invocation::None => "none",
        Invocation::Table(_) => "table",
        Invocation::TableName(_) => "table name",
        Invocation::Records { .. } => "records",
        Invocation::SchemaChange(_) => "schema change",
        Invocation::Command(_) => "command",
    }
}

impl Connector for ClickhouseConnector {
    fn name(&self) -> &str {
        "clickhouse"
    }

    fn register_capabilities(self: Arc<Self>, registry: &mut CapabilityRegistry) {
        for capability in [
            Capability::CreateTable,
            Capability::DropTable,
            Capability::ClearTable,
            Capability::CreateIndex,
            Capability::WriteRecord,
            Capability::BatchCount,
            Capability::NewField,
            Capability::AlterFieldName,
            Capability::AlterFieldAttributes,
            Capability::DropField,
            Capability::ExecuteCommand,
            Capability::GetTableInfo,
        ] {
            if let Some(kind) = ddl_kind(capability) {
                if !self.dispatcher.supports(kind) {
                    debug!("Skipping {capability}: no handler for {kind}");
                    continue;
                }
            }
            let this = Arc::clone(&self);
            registry.register(capability, move |invocation| {
                Arc::clone(&this).invoke(capability, invocation)
            });
        }
    }
}

fn ddl_kind(capability: Capability) -> Option<DdlKind> {
    DdlKind::ALL
        .into_iter()
        .find(|kind| Capability::for_ddl(*kind) == capability)
}

//! Capture consumer writing batches through a connector.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use batch_sink::WriteListResult;
use cdc_runner::{CaptureConsumer, StreamOffset};
use checkpoint::CheckpointManager;
use connector::{Capability, CapabilityRegistry, Invocation, Outcome};
use indexmap::IndexMap;
use sync_core::{RecordEvent, Table};
use tracing::{info, warn};

/// Writes each batch table by table, then saves the batch's offset.
///
/// The offset is saved only once every table of the batch has been
/// committed; a failed write leaves the previous checkpoint in place.
pub struct ReplicationSink {
    tables: HashMap<String, Table>,
    registry: CapabilityRegistry,
    checkpoints: CheckpointManager,
    totals: Mutex<WriteListResult>,
}

impl ReplicationSink {
    pub fn new(
        tables: Vec<Table>,
        registry: CapabilityRegistry,
        checkpoints: CheckpointManager,
    ) -> anyhow::Result<Self> {
        if !registry.supports(Capability::WriteRecord) {
            anyhow::bail!("Connector does not support {}", Capability::WriteRecord);
        }
        Ok(Self {
            tables: tables
                .into_iter()
                .map(|t| (t.id().to_string(), t))
                .collect(),
            registry,
            checkpoints,
            totals: Mutex::new(WriteListResult::default()),
        })
    }

    /// Create every known table, in name order. Returns the statements run.
    pub async fn create_tables(&self) -> anyhow::Result<Vec<String>> {
        if !self.registry.supports(Capability::CreateTable) {
            warn!("Connector cannot create tables; assuming they exist");
            return Ok(Vec::new());
        }

        let mut names: Vec<&String> = self.tables.keys().collect();
        names.sort();

        let mut statements = Vec::new();
        for name in names {
            let outcome = self
                .registry
                .invoke(Capability::CreateTable, Invocation::Table(self.tables[name].clone()))
                .await?;
            if let Outcome::Statements(created) = outcome {
                statements.extend(created);
            }
        }
        Ok(statements)
    }

    /// Counters accumulated over every committed batch.
    pub fn totals(&self) -> WriteListResult {
        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CaptureConsumer for ReplicationSink {
    async fn on_started(&self) {
        info!(
            "Replicating into {} tables under session '{}'",
            self.tables.len(),
            self.checkpoints.session()
        );
    }

    async fn on_batch(&self, events: Vec<RecordEvent>, offset: &StreamOffset) -> anyhow::Result<()> {
        let mut by_table: IndexMap<String, Vec<RecordEvent>> = IndexMap::new();
        for event in events {
            by_table
                .entry(event.table().to_string())
                .or_default()
                .push(event);
        }

        for (name, events) in by_table {
            let Some(table) = self.tables.get(&name) else {
                warn!("Dropping {} events for undeclared table '{name}'", events.len());
                continue;
            };

            let outcome = self
                .registry
                .invoke(
                    Capability::WriteRecord,
                    Invocation::Records {
                        table: table.clone(),
                        events,
                    },
                )
                .await?;

            if let Outcome::Written(result) = outcome {
                if result.failed() > 0 {
                    warn!("{} events on '{name}' could not be written", result.failed());
                }
                self.totals
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .merge(result);
            }
        }

        self.checkpoints.save(offset).await
    }

    async fn on_ended(&self) {
        info!("Replication ended: {}", self.totals());
    }
}

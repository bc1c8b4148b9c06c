//! A destination driver that logs statements instead of sending them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use batch_sink::DestinationDriver;
use clickhouse_types::{codec_registry, ClickhouseDdl, ClickhouseStatements};
use sync_codec::NativeRow;
use tracing::{debug, info};

/// Renders every call as ClickHouse SQL, logs it at info level and keeps
/// a transcript. Queries return no rows.
pub struct DryRunDriver {
    statements: ClickhouseStatements,
    transcript: Mutex<Vec<String>>,
    commits: Mutex<u64>,
}

impl DryRunDriver {
    pub fn new(database: Option<String>) -> Self {
        let ddl = ClickhouseDdl::new(database, Arc::new(codec_registry()));
        Self {
            statements: ClickhouseStatements::new(Arc::new(ddl)),
            transcript: Mutex::new(Vec::new()),
            commits: Mutex::new(0),
        }
    }

    /// Every statement rendered so far, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn commits(&self) -> u64 {
        *self
            .commits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, statement: String) {
        info!("{statement}");
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(statement);
    }
}

#[async_trait]
impl DestinationDriver for DryRunDriver {
    async fn execute(&self, statement: &str) -> anyhow::Result<()> {
        self.record(statement.to_string());
        Ok(())
    }

    async fn query(&self, statement: &str) -> anyhow::Result<Vec<NativeRow>> {
        debug!("Dry run, not querying: {statement}");
        Ok(Vec::new())
    }

    async fn append(&self, table: &str, rows: &[NativeRow]) -> anyhow::Result<()> {
        if !rows.is_empty() {
            self.record(self.statements.render_insert(table, rows));
        }
        Ok(())
    }

    async fn commit(&self) -> anyhow::Result<()> {
        *self
            .commits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        debug!("Dry run commit");
        Ok(())
    }
}

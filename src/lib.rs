//! relay-sync
//!
//! Replays a captured change stream into ClickHouse.
//!
//! A capture session reads raw change records from a JSON Lines file,
//! normalizes them into record events and hands them over in batches. Each
//! batch is written through the ClickHouse connector's `write_record`
//! capability, then its offset is saved so a later run can resume right
//! after it.
//!
//! # CLI Usage
//!
//! ```bash
//! # Replay a change file, resuming from the last saved offset
//! relay-sync replay --config relay.toml --input changes.jsonl --resume
//!
//! # Print the CREATE TABLE statements for the configured schema
//! relay-sync ddl --config relay.toml
//! ```

use std::path::Path;
use std::sync::Arc;

use batch_sink::{DestinationDriver, WriteListResult};
use cdc_runner::{CaptureRunner, JsonlUpstream, SessionState, StreamOffset};
use checkpoint::{CheckpointManager, FilesystemStore};
use clickhouse_types::ClickhouseConnector;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod config;
mod dry_run;
mod sink;

pub use config::{ConfigOverrides, RelayConfig};
pub use dry_run::DryRunDriver;
pub use sink::ReplicationSink;

/// How a replay ended.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub state: SessionState,
    /// Offset of the last batch written and checkpointed
    pub offset: Option<StreamOffset>,
    pub totals: WriteListResult,
    pub failure: Option<String>,
}

/// Checkpoint manager for the configured session.
pub fn checkpoint_manager(config: &RelayConfig) -> CheckpointManager {
    CheckpointManager::new(
        Arc::new(FilesystemStore::new(&config.checkpoint_dir)),
        &config.slot,
    )
}

/// Replay `input` into `driver` until the file is exhausted or `shutdown`
/// fires. With `resume`, the session starts right after the saved offset.
pub async fn replay(
    config: &RelayConfig,
    input: &Path,
    resume: bool,
    driver: Arc<dyn DestinationDriver>,
    shutdown: CancellationToken,
) -> anyhow::Result<ReplayReport> {
    let tables = config.load_tables()?;
    let checkpoints = checkpoint_manager(config);
    let resume_from = if resume {
        checkpoints.load::<StreamOffset>().await?
    } else {
        None
    };

    let registry = connector::start(Arc::new(ClickhouseConnector::with_policy(
        driver,
        config.database.clone(),
        config.write_policy(),
    )));
    let sink = Arc::new(ReplicationSink::new(tables, registry, checkpoints)?);
    sink.create_tables().await?;

    let mut runner = CaptureRunner::new(&config.slot, config.runner_config(), sink.clone())?;
    runner
        .start(JsonlUpstream::new(input), &config.watch, resume_from)
        .await?;

    let state = tokio::select! {
        state = runner.wait() => state,
        _ = shutdown.cancelled() => {
            info!("Shutdown requested, stopping capture session '{}'", runner.name());
            runner.stop_and_wait().await
        }
    };

    Ok(ReplayReport {
        state,
        offset: runner.last_offset(),
        totals: sink.totals(),
        failure: runner.failure().map(|e| e.to_string()),
    })
}

/// CREATE TABLE (and index) statements for the configured schema.
pub async fn table_statements(config: &RelayConfig) -> anyhow::Result<Vec<String>> {
    let registry = connector::start(Arc::new(ClickhouseConnector::new(
        Arc::new(DryRunDriver::new(config.database.clone())),
        config.database.clone(),
    )));
    let sink = ReplicationSink::new(config.load_tables()?, registry, checkpoint_manager(config))?;
    sink.create_tables().await
}

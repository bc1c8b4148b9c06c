//! Command-line interface for relay-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Replay a change file from the beginning
//! relay-sync replay --config relay.toml --input changes.jsonl
//!
//! # Resume after the last checkpointed batch, with a larger batch size
//! RELAY_BATCH_SIZE=5000 relay-sync replay --config relay.toml --input changes.jsonl --resume
//!
//! # Print table DDL
//! relay-sync ddl --config relay.toml
//! ```
//!
//! Log output is controlled with `RUST_LOG`, e.g. `RUST_LOG=relay_sync=debug,info`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cdc_runner::SessionState;
use clap::{Args, Parser, Subcommand};
use relay_sync::{ConfigOverrides, DryRunDriver, RelayConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "relay-sync")]
#[command(about = "Replay captured change streams into ClickHouse")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON Lines change file
    Replay {
        #[command(flatten)]
        config: ConfigArgs,

        /// Change file to read
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Resume after the last saved checkpoint of the slot
        #[arg(long)]
        resume: bool,
    },
    /// Print CREATE TABLE statements for the configured schema
    Ddl {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Relay configuration file (TOML)
    #[arg(long, value_name = "PATH", env = "RELAY_CONFIG")]
    config: PathBuf,

    /// Destination database, overriding the configuration file
    #[arg(long, env = "RELAY_DATABASE")]
    database: Option<String>,

    /// Events per batch, overriding the configuration file
    #[arg(long, env = "RELAY_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Checkpoint directory, overriding the configuration file
    #[arg(long, value_name = "PATH", env = "RELAY_CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(self) -> anyhow::Result<RelayConfig> {
        RelayConfig::load(&self.config)?.apply(ConfigOverrides {
            database: self.database,
            batch_size: self.batch_size,
            checkpoint_dir: self.checkpoint_dir,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            config,
            input,
            resume,
        } => {
            let config = config.load()?;
            let driver = Arc::new(DryRunDriver::new(config.database.clone()));

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal.cancel();
                }
            });

            let report = relay_sync::replay(&config, &input, resume, driver, shutdown)
                .await
                .with_context(|| format!("Replay of {} failed", input.display()))?;

            if let Some(failure) = &report.failure {
                error!("Capture session '{}' failed: {failure}", config.slot);
            }
            info!(
                "Replay finished in state {:?}: {} (checkpoint: {})",
                report.state,
                report.totals,
                report
                    .offset
                    .as_ref()
                    .map(|o| o.source_offset.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            if report.state == SessionState::Failed {
                anyhow::bail!(
                    "Capture session '{}' failed: {}",
                    config.slot,
                    report.failure.unwrap_or_default()
                );
            }
        }
        Commands::Ddl { config } => {
            let config = config.load()?;
            for statement in relay_sync::table_statements(&config).await? {
                println!("{statement};");
            }
        }
    }

    Ok(())
}

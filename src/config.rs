//! Relay configuration file.
//!
//! ```toml
//! slot = "orders-slot"
//! database = "shop"
//! batch_size = 500
//! watch = ["orders", "customers"]
//! insert_policy = "update_on_exists"
//! update_policy = "insert_on_non_exists"
//! checkpoint_dir = ".relay-sync-checkpoints"
//! schema_file = "schema.yaml"
//! ```
//!
//! A relative `schema_file` or `checkpoint_dir` is resolved against the
//! directory holding the configuration file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use batch_sink::{InsertPolicy, UpdatePolicy, WritePolicy};
use cdc_runner::RunnerConfig;
use serde::Deserialize;
use sync_core::{SchemaFile, Table};

fn default_batch_size() -> usize {
    1000
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".relay-sync-checkpoints")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Name of the capture session; also keys its checkpoint
    pub slot: String,

    /// Destination database. Tables are unqualified when absent.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Tables to capture; empty means every table
    #[serde(default)]
    pub watch: Vec<String>,

    #[serde(default)]
    pub insert_policy: InsertPolicy,

    #[serde(default)]
    pub update_policy: UpdatePolicy,

    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// YAML file with the table descriptors
    pub schema_file: PathBuf,
}

/// Values given on the command line, overriding the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<String>,
    pub batch_size: Option<usize>,
    pub checkpoint_dir: Option<PathBuf>,
}

impl RelayConfig {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: RelayConfig = toml::from_str(content).context("Invalid relay configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, resolving relative paths against its
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.schema_file = resolve(base, &config.schema_file);
            config.checkpoint_dir = resolve(base, &config.checkpoint_dir);
        }
        Ok(config)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        if let Some(database) = overrides.database {
            self.database = Some(database);
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(dir) = overrides.checkpoint_dir {
            self.checkpoint_dir = dir;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        checkpoint::validate_session(&self.slot).context("Invalid slot")?;
        self.runner_config().validate()?;
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            batch_size: self.batch_size,
        }
    }

    /// The destination's policy with the configured conflict rules.
    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy {
            insert: self.insert_policy,
            update: self.update_policy,
            ..clickhouse_types::write_policy()
        }
    }

    pub fn load_tables(&self) -> anyhow::Result<Vec<Table>> {
        let schema = SchemaFile::from_file(&self.schema_file).with_context(|| {
            format!("Failed to load table schema from {}", self.schema_file.display())
        })?;
        Ok(schema.tables)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_sink::UpdateStrategy;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_toml(
            r#"
            slot = "s1"
            schema_file = "schema.yaml"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 1000);
        assert!(config.watch.is_empty());
        assert_eq!(config.database, None);
        assert_eq!(config.insert_policy, InsertPolicy::UpdateOnExists);
        assert_eq!(config.checkpoint_dir, PathBuf::from(".relay-sync-checkpoints"));
    }

    #[test]
    fn test_policies_keep_destination_strategy() {
        let config = RelayConfig::from_toml(
            r#"
            slot = "s1"
            schema_file = "schema.yaml"
            insert_policy = "ignore_on_exists"
            update_policy = "ignore_on_non_exists"
            "#,
        )
        .unwrap();

        let policy = config.write_policy();
        assert_eq!(policy.insert, InsertPolicy::IgnoreOnExists);
        assert_eq!(policy.update, UpdatePolicy::IgnoreOnNonExists);
        assert_eq!(policy.update_strategy, UpdateStrategy::Append);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let err = RelayConfig::from_toml(
            r#"
            slot = "s1"
            schema_file = "schema.yaml"
            batch_size = 0
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("batch_size"));

        let config = RelayConfig::from_toml("slot = \"s1\"\nschema_file = \"x.yaml\"").unwrap();
        assert!(config
            .apply(ConfigOverrides {
                batch_size: Some(0),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn test_rejects_unusable_slot_names() {
        for slot in ["", "orders/slot", "../up"] {
            let err = RelayConfig::from_toml(&format!("slot = \"{slot}\"\nschema_file = \"x\""))
                .unwrap_err();
            assert!(format!("{err:#}").contains("Invalid slot"), "{slot:?}: {err:#}");
        }
        assert!(RelayConfig::from_toml("slot = \"orders.v2\"\nschema_file = \"x\"").is_ok());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(RelayConfig::from_toml("slot = \"s\"\nschema_file = \"x\"\nbatchsize = 3").is_err());
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "slot = \"s1\"\nschema_file = \"schema.yaml\"\ncheckpoint_dir = \"/var/lib/relay\"\n",
        )
        .unwrap();

        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.schema_file, dir.path().join("schema.yaml"));
        assert_eq!(config.checkpoint_dir, PathBuf::from("/var/lib/relay"));
    }
}

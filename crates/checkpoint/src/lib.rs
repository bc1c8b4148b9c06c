//! Checkpoint persistence for relay-sync
//!
//! A checkpoint is an opaque, source-defined position in an upstream change
//! stream. This crate only requires that it round-trips: serialize, store,
//! reload, resume at the identical capture position.
//!
//! # Architecture
//!
//! - `Checkpoint` - trait implemented by each source's offset type
//! - `CheckpointFile` - self-describing JSON envelope around a checkpoint
//! - `CheckpointStore` - storage backend trait
//! - `CheckpointManager` - saves and loads the checkpoint of one capture session
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - one JSON file per session, overwritten on every save
//! - `MemoryStore` - process-local map, for dry runs and tests
//!
//! A session has exactly one active checkpoint. Saving replaces it; nothing is
//! merged.

mod file;
mod filesystem;
mod manager;
pub mod store;

#[cfg(test)]
mod tests;

pub use file::CheckpointFile;
pub use filesystem::{validate_session, FilesystemStore};
pub use manager::CheckpointManager;
pub use store::{CheckpointID, CheckpointStore, MemoryStore};

/// Trait that source-specific checkpoints must implement.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct LogPosition {
///     pub file: String,
///     pub position: u64,
/// }
///
/// impl Checkpoint for LogPosition {
///     const SOURCE_TYPE: &'static str = "binlog";
///
///     fn to_cli_string(&self) -> String {
///         format!("{}:{}", self.file, self.position)
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         let (file, position) = s
///             .rsplit_once(':')
///             .ok_or_else(|| anyhow::anyhow!("Invalid checkpoint format"))?;
///         Ok(Self {
///             file: file.to_string(),
///             position: position.parse()?,
///         })
///     }
/// }
/// ```
pub trait Checkpoint:
    serde::Serialize + for<'de> serde::Deserialize<'de> + Clone + Send + Sync
{
    /// Source type identifier (e.g., "jsonl", "wal").
    ///
    /// Written into every `CheckpointFile` and checked again on load, so a
    /// checkpoint of one source can never resume another.
    const SOURCE_TYPE: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}

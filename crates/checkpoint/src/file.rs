//! Checkpoint file envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Checkpoint;

/// Storage-agnostic checkpoint envelope.
///
/// # File Format
///
/// ```json
/// {
///     "source_type": "jsonl",
///     "session": "orders-slot",
///     "checkpoint": { "line": 42, "table": "orders" },
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Source type identifier (e.g., "jsonl")
    pub source_type: String,
    /// Capture session the checkpoint belongs to
    pub session: String,
    /// Serialized checkpoint data
    pub checkpoint: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    /// Wrap a source-specific checkpoint.
    pub fn new<C: Checkpoint>(checkpoint: &C, session: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            source_type: C::SOURCE_TYPE.to_string(),
            session: session.into(),
            checkpoint: serde_json::to_value(checkpoint)?,
            created_at: Utc::now(),
        })
    }

    /// Parse the checkpoint into its source-specific type.
    ///
    /// Fails if the stored `source_type` differs from `C::SOURCE_TYPE` or the
    /// payload does not deserialize into `C`.
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.source_type != C::SOURCE_TYPE {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::SOURCE_TYPE,
                self.source_type
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }
}

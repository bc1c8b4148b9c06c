//! Filesystem-based checkpoint storage implementation.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::store::{CheckpointID, CheckpointStore};
use crate::CheckpointFile;

/// Stores each session's checkpoint as one JSON file in a directory.
///
/// Files are named `checkpoint_{source_type}_{session}.json`. A save writes a
/// temporary file and renames it over the previous one, so a reader never
/// observes a half-written checkpoint.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path of the checkpoint file for `id`.
    ///
    /// Fails for session names that are not usable verbatim in a file name.
    pub fn path_for(&self, id: &CheckpointID) -> Result<PathBuf> {
        validate_session(&id.session)?;
        Ok(self
            .dir
            .join(format!("checkpoint_{}_{}.json", id.source_type, id.session)))
    }
}

/// Session names may use ASCII letters, digits, `-`, `_` and `.`, and must
/// not start with `.`.
pub fn validate_session(session: &str) -> Result<()> {
    let valid = !session.is_empty()
        && !session.starts_with('.')
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        bail!(
            "Invalid checkpoint session name '{session}': use ASCII letters, digits, '-', '_' or '.'"
        );
    }
    Ok(())
}

#[async_trait]
impl CheckpointStore for FilesystemStore {
    async fn store_checkpoint(&self, id: &CheckpointID, file: &CheckpointFile) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", self.dir.display())
        })?;

        let path = self.path_for(id)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(file)?)
            .with_context(|| format!("Failed to write checkpoint to {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace checkpoint {}", path.display()))?;

        tracing::debug!("Stored checkpoint {id} to {}", path.display());
        Ok(())
    }

    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<CheckpointFile>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
        let file = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint {}", path.display()))?;
        Ok(Some(file))
    }

    async fn clear_checkpoint(&self, id: &CheckpointID) -> Result<()> {
        let path = self.path_for(id)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove checkpoint {}", path.display()))?;
        }
        Ok(())
    }
}

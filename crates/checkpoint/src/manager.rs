//! Per-session checkpoint manager.

use std::sync::Arc;

use crate::{store::CheckpointStore, Checkpoint, CheckpointFile, CheckpointID};

/// Saves and loads the checkpoint of one capture session.
///
/// # Example
///
/// ```rust,ignore
/// use checkpoint::{CheckpointManager, FilesystemStore};
///
/// let manager = CheckpointManager::new(Arc::new(FilesystemStore::new("/tmp/cp")), "orders");
/// manager.save(&offset).await?;
/// let resumed: Option<StreamOffset> = manager.load().await?;
/// ```
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    session: String,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, session: impl Into<String>) -> Self {
        Self {
            store,
            session: session.into(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn id<C: Checkpoint>(&self) -> CheckpointID {
        CheckpointID::new(C::SOURCE_TYPE, self.session.clone())
    }

    /// Replace the session's checkpoint.
    pub async fn save<C: Checkpoint>(&self, checkpoint: &C) -> anyhow::Result<()> {
        let file = CheckpointFile::new(checkpoint, self.session.clone())?;
        self.store.store_checkpoint(&self.id::<C>(), &file).await?;

        tracing::info!(
            "Saved {} checkpoint for session '{}': {}",
            C::SOURCE_TYPE,
            self.session,
            checkpoint.to_cli_string()
        );
        Ok(())
    }

    /// Load the session's checkpoint, if one was saved.
    ///
    /// The checkpoint type `C` is usually inferred from context:
    ///
    /// ```rust,ignore
    /// let offset: Option<StreamOffset> = manager.load().await?;
    /// ```
    pub async fn load<C: Checkpoint>(&self) -> anyhow::Result<Option<C>> {
        let Some(file) = self.store.read_checkpoint(&self.id::<C>()).await? else {
            tracing::debug!("No {} checkpoint for session '{}'", C::SOURCE_TYPE, self.session);
            return Ok(None);
        };
        let checkpoint: C = file.parse()?;
        tracing::info!(
            "Loaded {} checkpoint for session '{}': {}",
            C::SOURCE_TYPE,
            self.session,
            checkpoint.to_cli_string()
        );
        Ok(Some(checkpoint))
    }

    pub async fn clear<C: Checkpoint>(&self) -> anyhow::Result<()> {
        self.store.clear_checkpoint(&self.id::<C>()).await
    }
}

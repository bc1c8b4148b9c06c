//! Upstream and consumer interfaces of a capture session.

use async_trait::async_trait;
use sync_core::RecordEvent;

use crate::{RawRecord, StreamOffset};

/// A replication stream the runner reads raw records from.
#[async_trait]
pub trait UpstreamSource: Send {
    /// Open the stream scoped to `watch` (all tables when empty), resuming
    /// strictly after `resume` when given. Returns once the upstream is ready.
    async fn open(&mut self, watch: &[String], resume: Option<&StreamOffset>)
        -> anyhow::Result<()>;

    /// Next record, or `None` once the stream is exhausted.
    async fn next_record(&mut self) -> anyhow::Result<Option<RawRecord>>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Receives the output of a capture session.
///
/// All calls come from the session's worker, one at a time. A slow
/// `on_batch` backpressures the whole session.
#[async_trait]
pub trait CaptureConsumer: Send + Sync {
    async fn on_started(&self) {}

    /// Accept a batch. `offset` covers every event in `events` and nothing
    /// after them; persist it to resume the session later.
    async fn on_batch(&self, events: Vec<RecordEvent>, offset: &StreamOffset)
        -> anyhow::Result<()>;

    /// Called once when the session ends, cleanly or not. Check the session's
    /// failure slot to tell the two apart.
    async fn on_ended(&self) {}
}

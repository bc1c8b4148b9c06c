//! Change-capture runner for relay-sync.
//!
//! A [`CaptureRunner`] owns one capture session: it opens an
//! [`UpstreamSource`], normalizes each [`RawRecord`] into a
//! [`sync_core::RecordEvent`], buffers events into batches of
//! `batch_size`, and hands every batch together with its [`StreamOffset`] to
//! a [`CaptureConsumer`].
//!
//! The offset handed with a batch always covers exactly the events in that
//! batch and everything before them. On stop or upstream exhaustion a
//! partially filled buffer is still flushed.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut runner = CaptureRunner::new("orders-slot", RunnerConfig { batch_size: 500 }, consumer)?;
//! runner.start(JsonlUpstream::new("changes.jsonl"), &watch, resume).await?;
//! let state = runner.wait().await;
//! if let Some(failure) = runner.failure() {
//!     tracing::error!("capture failed: {failure}");
//! }
//! ```

mod error;
pub mod jsonl;
mod offset;
pub mod record;
mod runner;
mod source;

pub use error::{CaptureError, Result};
pub use jsonl::JsonlUpstream;
pub use offset::StreamOffset;
pub use record::{normalize, ClockUnit, RawRecord};
pub use runner::{CaptureRunner, RunnerConfig, SessionState};
pub use source::{CaptureConsumer, UpstreamSource};

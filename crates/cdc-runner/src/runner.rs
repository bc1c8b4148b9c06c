//! Capture session lifecycle, batching and checkpointing.

use std::sync::{Arc, Mutex, MutexGuard};

use sync_core::RecordEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::record::normalize;
use crate::{CaptureConsumer, CaptureError, Result, StreamOffset, UpstreamSource};

/// Lifecycle of a capture session.
///
/// `Idle -> Starting -> Running -> Stopping -> Stopped`, with `Failed`
/// reachable from `Starting` and `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Events per flushed batch
    pub batch_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CaptureError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SessionState>,
    failure: Mutex<Option<Arc<CaptureError>>>,
    offset: Mutex<Option<StreamOffset>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        *lock(&self.state) = state;
    }

    fn fail(&self, error: CaptureError) {
        *lock(&self.failure) = Some(Arc::new(error));
        self.set_state(SessionState::Failed);
    }
}

/// Runs one capture session over an upstream source.
///
/// The session's offset belongs to the runner: it is advanced only by the
/// session worker, after each successful batch handoff.
pub struct CaptureRunner {
    name: String,
    config: RunnerConfig,
    consumer: Arc<dyn CaptureConsumer>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl CaptureRunner {
    pub fn new(
        name: impl Into<String>,
        config: RunnerConfig,
        consumer: Arc<dyn CaptureConsumer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            consumer,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Idle),
                failure: Mutex::new(None),
                offset: Mutex::new(None),
            }),
            cancel: CancellationToken::new(),
            worker: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Why the session failed, if it did.
    pub fn failure(&self) -> Option<Arc<CaptureError>> {
        lock(&self.shared.failure).clone()
    }

    /// Offset of the last batch the consumer accepted.
    pub fn last_offset(&self) -> Option<StreamOffset> {
        lock(&self.shared.offset).clone()
    }

    /// Open `upstream` and start the session worker.
    ///
    /// Blocks until the upstream is ready. If opening fails the session
    /// moves to `Failed`, the error is placed in the failure slot, the
    /// consumer's `on_ended` fires, and `Ok(SessionState::Failed)` is
    /// returned. `Err` is reserved for starting a runner that is not idle.
    pub async fn start<U>(
        &mut self,
        mut upstream: U,
        watch: &[String],
        resume: Option<StreamOffset>,
    ) -> Result<SessionState>
    where
        U: UpstreamSource + 'static,
    {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(CaptureError::NotIdle {
                name: self.name.clone(),
                state,
            });
        }

        self.shared.set_state(SessionState::Starting);
        info!(
            "Starting capture session '{}' for {:?} from {}",
            self.name,
            watch,
            resume
                .as_ref()
                .map(|o| o.source_offset.to_string())
                .unwrap_or_else(|| "the beginning".to_string())
        );

        if let Err(e) = upstream.open(watch, resume.as_ref()).await {
            error!("Capture session '{}' failed to open upstream: {e:#}", self.name);
            self.shared.fail(CaptureError::Upstream(e));
            self.consumer.on_ended().await;
            return Ok(SessionState::Failed);
        }

        *lock(&self.shared.offset) = resume;
        self.shared.set_state(SessionState::Running);
        info!("Capture session '{}' running", self.name);
        self.consumer.on_started().await;

        let worker = Worker {
            name: self.name.clone(),
            batch_size: self.config.batch_size,
            consumer: Arc::clone(&self.consumer),
            shared: Arc::clone(&self.shared),
            cancel: self.cancel.clone(),
        };
        self.worker = Some(tokio::spawn(worker.run(upstream)));
        Ok(SessionState::Running)
    }

    /// Request a graceful stop. The buffered remainder is still flushed.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state == SessionState::Running {
                *state = SessionState::Stopping;
            }
        }
        info!("Stop requested for capture session '{}'", self.name);
        self.cancel.cancel();
    }

    /// Wait for the session worker to finish and return the final state.
    ///
    /// Cancel-safe: dropping the future leaves the worker running and a
    /// later call waits for it again.
    pub async fn wait(&mut self) -> SessionState {
        if let Some(worker) = self.worker.as_mut() {
            let joined = worker.await;
            self.worker = None;
            if let Err(e) = joined {
                error!("Capture worker '{}' did not finish: {e}", self.name);
                self.shared.fail(CaptureError::Worker(e.to_string()));
            }
        }
        self.state()
    }

    pub async fn stop_and_wait(&mut self) -> SessionState {
        self.stop();
        self.wait().await
    }
}

impl Drop for CaptureRunner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    name: String,
    batch_size: usize,
    consumer: Arc<dyn CaptureConsumer>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

struct Batch {
    events: Vec<RecordEvent>,
    offset: Option<StreamOffset>,
}

impl Worker {
    async fn run<U: UpstreamSource>(self, mut upstream: U) {
        let mut batch = Batch {
            events: Vec::with_capacity(self.batch_size),
            offset: None,
        };

        let mut outcome = self.pump(&mut upstream, &mut batch).await;

        // The remainder is flushed on a clean end and after an upstream
        // failure, but not after the consumer itself rejected a batch.
        if !matches!(outcome, Err(CaptureError::Consumer(_))) {
            if let Err(flush_error) = self.flush(&mut batch).await {
                if outcome.is_ok() {
                    outcome = Err(flush_error);
                } else {
                    warn!(
                        "Capture session '{}' could not flush remainder: {flush_error}",
                        self.name
                    );
                }
            }
        }

        if let Err(e) = upstream.close().await {
            warn!("Capture session '{}' failed to close upstream: {e:#}", self.name);
        }

        match outcome {
            Ok(()) => {
                self.shared.set_state(SessionState::Stopped);
                info!("Capture session '{}' stopped", self.name);
            }
            Err(e) => {
                error!("Capture session '{}' failed: {e}", self.name);
                self.shared.fail(e);
            }
        }
        self.consumer.on_ended().await;
    }

    async fn pump<U: UpstreamSource>(&self, upstream: &mut U, batch: &mut Batch) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Capture session '{}' cancelled", self.name);
                    return Ok(());
                }
                next = upstream.next_record() => next,
            };

            let raw = match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("Upstream of capture session '{}' exhausted", self.name);
                    return Ok(());
                }
                Err(e) => return Err(CaptureError::Upstream(e)),
            };

            let Some(event) = normalize(&raw) else {
                continue;
            };
            batch.events.push(event);
            batch.offset = Some(StreamOffset::new(raw.source_offset));

            if batch.events.len() >= self.batch_size {
                self.flush(batch).await?;
            }
        }
    }

    /// Hand the buffered events and their offset to the consumer.
    async fn flush(&self, batch: &mut Batch) -> Result<()> {
        if batch.events.is_empty() {
            return Ok(());
        }
        let Some(offset) = batch.offset.take() else {
            return Ok(());
        };
        let events = std::mem::replace(&mut batch.events, Vec::with_capacity(self.batch_size));
        let count = events.len();

        self.consumer
            .on_batch(events, &offset)
            .await
            .map_err(CaptureError::Consumer)?;

        debug!(
            "Capture session '{}' flushed {count} events at {}",
            self.name, offset.source_offset
        );
        *lock(&self.shared.offset) = Some(offset);
        Ok(())
    }
}

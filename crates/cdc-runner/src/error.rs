use crate::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Invalid runner configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture session '{name}' cannot start from state {state:?}")]
    NotIdle { name: String, state: SessionState },

    /// The upstream could not be opened or failed mid-session.
    #[error("Upstream failure: {0:#}")]
    Upstream(#[source] anyhow::Error),

    /// The consumer rejected a batch.
    #[error("Consumer failed to accept batch: {0:#}")]
    Consumer(#[source] anyhow::Error),

    #[error("Capture worker terminated abnormally: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

use sync_codec::CodecError;
use sync_core::SchemaError;

use crate::WriteAction;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// A value could not be mapped for the destination
    #[error("Failed to convert field '{field}': {source}")]
    Conversion {
        field: String,
        #[source]
        source: CodecError,
    },

    /// The liveness token was cancelled mid-batch. Nothing of the batch was committed.
    #[error("Write to '{table}' interrupted after {processed} of {total} events")]
    Interrupted {
        table: String,
        processed: usize,
        total: usize,
    },

    #[error("Destination driver error: {0:#}")]
    Driver(#[source] anyhow::Error),

    #[error("Schema violation: {0}")]
    SchemaViolation(#[from] SchemaError),

    #[error("Event for table '{event_table}' sent to writer of '{table}'")]
    TableMismatch { table: String, event_table: String },

    #[error("Update on '{table}' has no before-image and the destination requires one")]
    MissingBeforeImage { table: String },

    #[error("Cannot render {action} for '{table}': {reason}")]
    Statement {
        action: WriteAction,
        table: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, WriteError>;

use sync_core::{DdlKind, SchemaError, ValueKind};

/// A value could not be mapped to its destination representation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Cannot convert {kind} value: {reason}")]
    Conversion { kind: ValueKind, reason: String },

    #[error("Cannot coerce {kind} value to {target}: {reason}")]
    Coercion {
        kind: ValueKind,
        target: String,
        reason: String,
    },
}

impl CodecError {
    pub fn conversion(kind: ValueKind, reason: impl Into<String>) -> Self {
        CodecError::Conversion {
            kind,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DdlError {
    /// The destination has no handler for this kind of schema change.
    #[error("Unsupported DDL kind: {0}")]
    UnsupportedKind(DdlKind),

    /// A handler was invoked with an event of another kind.
    #[error("Handler for {expected} received a {found} event")]
    KindMismatch { expected: DdlKind, found: DdlKind },

    #[error("Invalid {kind} event for table '{table}': {reason}")]
    InvalidEvent {
        kind: DdlKind,
        table: String,
        reason: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

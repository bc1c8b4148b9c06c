//! Core types for the relay-sync runtime.
//!
//! This crate provides the model every other crate speaks:
//!
//! - [`FieldType`] - declared logical column types
//! - [`TypedValue`] / [`ValueKind`] - destination-agnostic values and their kind tags
//! - [`Table`], [`Field`], [`Index`] - validated table descriptors
//! - [`RecordEvent`] - row mutations
//! - [`SchemaChangeEvent`] / [`DdlKind`] - schema changes
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── sync-codec        (codec registry, DDL dispatch)
//!    ├─── cdc-runner        (raw change records -> RecordEvent batches)
//!    ├─── batch-sink        (RecordEvent batches -> destination)
//!    └─── clickhouse-types  (reference destination dialect)
//! ```

pub mod event;
pub mod schema;
pub mod types;
pub mod values;

pub use event::{DdlKind, EventError, RecordEvent, RecordOp, Row, SchemaChangeEvent};
pub use schema::{Field, Index, IndexField, SchemaError, SchemaFile, Table, TableBuilder};
pub use types::FieldType;
pub use values::{TypedValue, ValueKind};

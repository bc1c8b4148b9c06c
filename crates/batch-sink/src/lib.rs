//! Batch-write engine for relay-sync.
//!
//! [`BatchWriter`] turns batches of [`sync_core::RecordEvent`]s into
//! destination statements:
//!
//! 1. Each event's image is converted field by field through a
//!    [`sync_codec::CodecRegistry`] using the table's declared field types.
//! 2. The destination's [`WritePolicy`] maps the logical operation to one or
//!    more [`WriteAction`]s.
//! 3. A dialect-specific [`StatementBuilder`] renders each action as a bulk
//!    append row or a SQL statement.
//! 4. [`TableWriter::commit`] sends everything through the
//!    [`DestinationDriver`] in event order.
//!
//! Writes to one table are serialized; different tables may be written
//! concurrently.

mod driver;
mod error;
mod policy;
mod result;
mod writer;

pub use driver::{DestinationDriver, Statement, StatementBuilder, WriteRequest};
pub use error::{Result, WriteError};
pub use policy::{InsertPolicy, UpdatePolicy, UpdateStrategy, WriteAction, WritePolicy};
pub use result::{EventOutcome, WriteListResult};
pub use writer::{BatchWriter, TableWriter};

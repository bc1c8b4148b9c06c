//! Destination driver and statement builder seams.

use async_trait::async_trait;
use sync_codec::NativeRow;
use sync_core::Table;

use crate::{Result, WriteAction};

/// Connection to a destination.
///
/// Drivers are shared between table writers, so every method takes `&self`.
/// Calls block until the destination acknowledges.
#[async_trait]
pub trait DestinationDriver: Send + Sync {
    /// Run one statement that returns no rows.
    async fn execute(&self, statement: &str) -> anyhow::Result<()>;

    /// Run a query and collect its rows.
    async fn query(&self, statement: &str) -> anyhow::Result<Vec<NativeRow>>;

    /// Stream rows into `table` through the destination's bulk path.
    async fn append(&self, table: &str, rows: &[NativeRow]) -> anyhow::Result<()>;

    /// Make everything sent since the last commit durable.
    async fn commit(&self) -> anyhow::Result<()>;
}

/// One unit of work for the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A row for the bulk append path
    Append(NativeRow),
    Sql(String),
}

/// Converted payload handed to a [`StatementBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub action: WriteAction,
    /// Converted image the action writes; empty for deletes
    pub row: &'a NativeRow,
    /// Converted primary-key values identifying the target row
    pub key: &'a NativeRow,
}

/// Renders physical write actions in a destination's dialect.
pub trait StatementBuilder: Send + Sync {
    fn build(&self, table: &Table, request: WriteRequest<'_>) -> Result<Statement>;
}

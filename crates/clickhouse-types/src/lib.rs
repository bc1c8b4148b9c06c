//! ClickHouse dialect for relay-sync.
//!
//! - [`codec_registry`] - value codecs (documents as JSON text, booleans as
//!   `UInt8`, binary as base64)
//! - [`ClickhouseDdl`] - column types and `CREATE TABLE` generation
//! - [`ddl_dispatcher`] - handlers for every schema-change kind
//! - [`ClickhouseStatements`] - write statements for the batch engine
//! - [`discover`] - tables from `system.columns`
//! - [`ClickhouseConnector`] - capability registration over a driver
//!
//! The crate never opens a connection itself; everything goes through a
//! [`batch_sink::DestinationDriver`].

mod codecs;
mod ddl;
mod destination;
mod discovery;
mod handlers;
mod statement;

pub use codecs::{codec_registry, register_codecs, DATETIME_FRACTION, TIME_FRACTION};
pub use ddl::{quote_ident, ClickhouseDdl};
pub use destination::ClickhouseConnector;
pub use discovery::{columns_query, discover, parse_type, tables_from_columns, ColumnRow};
pub use handlers::ddl_dispatcher;
pub use statement::{write_policy, ClickhouseStatements};

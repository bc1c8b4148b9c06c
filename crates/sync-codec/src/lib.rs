//! Value codecs and schema-change dispatch for relay-sync destinations.
//!
//! # Structure
//!
//! - `registry`: kind-keyed `CodecRegistry` turning `TypedValue` into `NativeValue`
//! - `coerce`: declared-type coercion applied before codec lookup
//! - `native`: `NativeValue` and SQL literal rendering
//! - `ddl`: `ToDdl` and the kind-keyed `DdlDispatcher`
//!
//! # Example
//!
//! ```rust
//! use sync_codec::{CodecRegistry, NativeValue};
//! use sync_core::{TypedValue, ValueKind};
//!
//! let mut codecs = CodecRegistry::new();
//! codecs.register(ValueKind::Boolean, Some("UInt8"), |v| match v {
//!     TypedValue::Boolean(b) => Ok(NativeValue::UInt(u64::from(*b))),
//!     other => Err(sync_codec::CodecError::conversion(other.kind(), "not a boolean")),
//! });
//!
//! let converted = codecs.convert(&TypedValue::Boolean(true)).unwrap();
//! assert_eq!(converted.value, NativeValue::UInt(1));
//! assert!(!converted.fallback);
//! ```

pub mod coerce;
pub mod ddl;
mod error;
pub mod native;
pub mod registry;

pub use coerce::coerce;
pub use ddl::{DdlDispatcher, DdlHandler, DispatchReport, ToDdl};
pub use error::{CodecError, DdlError};
pub use native::{NativeRow, NativeValue};
pub use registry::{Codec, CodecRegistry, Conversion, ConvertFn};

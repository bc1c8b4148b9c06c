//! Kind-keyed codec registry.

use std::collections::HashMap;
use std::sync::Arc;

use sync_core::{FieldType, TypedValue, ValueKind};

use crate::coerce::coerce;
use crate::native::NativeValue;
use crate::CodecError;

pub type ConvertFn = Arc<dyn Fn(&TypedValue) -> Result<NativeValue, CodecError> + Send + Sync>;

/// A registered conversion for one value kind.
#[derive(Clone)]
pub struct Codec {
    target_type: Option<String>,
    convert: ConvertFn,
}

impl Codec {
    /// Destination column type used for fields of this kind, if the codec
    /// overrides the type derived from the declared field type.
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("target_type", &self.target_type)
            .finish_non_exhaustive()
    }
}

/// Result of converting one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub value: NativeValue,
    /// No codec was registered for the value's kind; `value` is the
    /// unconverted passthrough form.
    pub fallback: bool,
}

/// Maps each [`ValueKind`] to at most one [`Codec`].
///
/// Registering a kind again replaces the previous codec.
#[derive(Clone, Default, Debug)]
pub struct CodecRegistry {
    codecs: HashMap<ValueKind, Codec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: ValueKind, target_type: Option<&str>, convert: F) -> &mut Self
    where
        F: Fn(&TypedValue) -> Result<NativeValue, CodecError> + Send + Sync + 'static,
    {
        let codec = Codec {
            target_type: target_type.map(str::to_string),
            convert: Arc::new(convert),
        };
        if self.codecs.insert(kind, codec).is_some() {
            tracing::debug!("Replaced codec for {kind}");
        }
        self
    }

    pub fn is_registered(&self, kind: ValueKind) -> bool {
        self.codecs.contains_key(&kind)
    }

    pub fn get(&self, kind: ValueKind) -> Option<&Codec> {
        self.codecs.get(&kind)
    }

    pub fn target_type(&self, kind: ValueKind) -> Option<&str> {
        self.codecs.get(&kind).and_then(Codec::target_type)
    }

    /// Convert a value through the codec registered for its kind.
    ///
    /// Nulls without a codec convert to `NativeValue::Null` and are not a
    /// fallback. Any other kind without a codec passes through unconverted
    /// with `fallback` set.
    pub fn convert(&self, value: &TypedValue) -> Result<Conversion, CodecError> {
        let kind = value.kind();
        match self.codecs.get(&kind) {
            Some(codec) => Ok(Conversion {
                value: (codec.convert)(value)?,
                fallback: false,
            }),
            None if kind == ValueKind::Null => Ok(Conversion {
                value: NativeValue::Null,
                fallback: false,
            }),
            None => Ok(Conversion {
                value: NativeValue::passthrough(value),
                fallback: true,
            }),
        }
    }

    /// Coerce a value to the declared field type, then convert it.
    pub fn convert_field(
        &self,
        value: &TypedValue,
        field_type: &FieldType,
    ) -> Result<Conversion, CodecError> {
        let coerced = coerce(value, field_type)?;
        self.convert(&coerced)
    }
}

//! Codec contract
//!
//! Every value that reaches storage goes through a codec. Typed codecs
//! implement [`Codec<T>`]; the registry stores them behind [`ErasedCodec`] so
//! that values of any type can travel through one cache keyed by `TypeId` or
//! by wire type name.
//!
//! # Thread Safety
//!
//! Codecs are shared across threads through `Arc` and must be `Send + Sync`.

use crate::persist::Persist;
use crate::registry::Registry;
use keystash_core::{BinaryReader, BinaryWriter, DynValue, Error, Result};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Shape of the values a codec handles, fixed when the codec is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Scalar or fixed-size math value
    Scalar,
    /// Enumeration backed by an integer codec
    Enum,
    /// Fixed-length array (`Box<[T]>`)
    Array,
    /// Ordered list (`Vec<T>`, `VecDeque<T>`)
    List,
    /// Associative map
    Map,
    /// Optional value
    Optional,
    /// Schema-driven composite
    Structural,
    /// Explicitly registered codec
    Custom,
}

/// On-wire layout used by structural codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationMode {
    /// Self-describing, keyed by stable field ids; tolerant of schema changes
    #[default]
    Tagged,
    /// Positional with no metadata; smaller, but breaks on member reordering
    Compact,
}

/// Read/write contract for one runtime type
///
/// `registry` is passed through so composite codecs can delegate nested values
/// back to the registry.
pub trait Codec<T>: Send + Sync + 'static {
    /// Write `value` to the sink
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, value: &T) -> Result<()>;

    /// Read a value from the source
    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<T>;

    /// Schema version of the data this codec writes
    fn version(&self) -> u32 {
        1
    }

    /// Lower a value to its type-neutral form, if it has one
    fn to_dynamic(&self, _registry: &Registry, _value: &T) -> Option<DynValue> {
        None
    }

    /// Build a value from a type-neutral value of another type
    fn from_dynamic(&self, _registry: &Registry, value: &DynValue) -> Result<T> {
        Err(Error::conversion(
            value.kind_name(),
            std::any::type_name::<T>(),
            "no conversion defined",
        ))
    }

    /// Human-readable form used when converting to a string
    ///
    /// Defaults to the display form of [`Codec::to_dynamic`]. `None` makes
    /// the erased codec fall back to the wire type name.
    fn render(&self, registry: &Registry, value: &T) -> Option<String> {
        self.to_dynamic(registry, value).map(|v| v.to_string())
    }
}

/// Type-erased codec stored by the registry
pub trait ErasedCodec: Send + Sync {
    /// Stable wire type name
    fn type_name(&self) -> &str;

    /// Runtime type of the values this codec handles
    fn value_type(&self) -> TypeId;

    /// Codec shape
    fn kind(&self) -> CodecKind;

    /// Schema version of the data this codec writes
    fn version(&self) -> u32;

    /// Write a value; fails if `value` is not of [`ErasedCodec::value_type`]
    fn write_any(&self, registry: &Registry, writer: &mut BinaryWriter, value: &dyn Any)
        -> Result<()>;

    /// Read a boxed value
    fn read_any(&self, registry: &Registry, reader: &mut BinaryReader<'_>)
        -> Result<Box<dyn Any + Send>>;

    /// Lower a value to its type-neutral form
    fn to_dynamic_any(&self, registry: &Registry, value: &dyn Any) -> Option<DynValue>;

    /// Build a boxed value from a type-neutral value
    fn from_dynamic_any(&self, registry: &Registry, value: &DynValue)
        -> Result<Box<dyn Any + Send>>;

    /// String form of a value; never fails
    fn render_any(&self, registry: &Registry, value: &dyn Any) -> String;

    /// Read a value and lower it immediately
    fn read_dynamic(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<DynValue> {
        let value = self.read_any(registry, reader)?;
        self.to_dynamic_any(registry, &*value).ok_or_else(|| {
            Error::conversion(self.type_name(), "dynamic value", "type has no scalar form")
        })
    }
}

/// Adapter from a typed [`Codec<T>`] to [`ErasedCodec`]
pub struct TypedCodec<T, C> {
    type_name: String,
    kind: CodecKind,
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> TypedCodec<T, C>
where
    T: Persist,
    C: Codec<T>,
{
    /// Wrap `codec` under the given wire name
    pub fn new(type_name: impl Into<String>, kind: CodecKind, codec: C) -> Self {
        TypedCodec {
            type_name: type_name.into(),
            kind,
            codec,
            _marker: PhantomData,
        }
    }

    /// Access the wrapped codec
    pub fn inner(&self) -> &C {
        &self.codec
    }

    fn downcast<'v>(&self, value: &'v dyn Any) -> Result<&'v T> {
        value
            .downcast_ref::<T>()
            .ok_or_else(|| Error::ValueTypeMismatch {
                expected: self.type_name.clone(),
            })
    }
}

impl<T, C> ErasedCodec for TypedCodec<T, C>
where
    T: Persist,
    C: Codec<T>,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn kind(&self) -> CodecKind {
        self.kind
    }

    fn version(&self) -> u32 {
        self.codec.version()
    }

    fn write_any(
        &self,
        registry: &Registry,
        writer: &mut BinaryWriter,
        value: &dyn Any,
    ) -> Result<()> {
        let value = self.downcast(value)?;
        self.codec.write(registry, writer, value)
    }

    fn read_any(
        &self,
        registry: &Registry,
        reader: &mut BinaryReader<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        let value = self.codec.read(registry, reader)?;
        Ok(Box::new(value))
    }

    fn to_dynamic_any(&self, registry: &Registry, value: &dyn Any) -> Option<DynValue> {
        let value = value.downcast_ref::<T>()?;
        self.codec.to_dynamic(registry, value)
    }

    fn render_any(&self, registry: &Registry, value: &dyn Any) -> String {
        value
            .downcast_ref::<T>()
            .and_then(|v| self.codec.render(registry, v))
            .unwrap_or_else(|| self.type_name.clone())
    }

    fn from_dynamic_any(
        &self,
        registry: &Registry,
        value: &DynValue,
    ) -> Result<Box<dyn Any + Send>> {
        match self.codec.from_dynamic(registry, value) {
            Ok(v) => Ok(Box::new(v)),
            // Report the wire name rather than whatever the codec used internally
            Err(Error::Conversion { from, reason, .. }) => Err(Error::Conversion {
                from,
                to: self.type_name.clone(),
                reason,
            }),
            Err(other) => Err(other),
        }
    }
}

/// Wrap a typed codec for `T` under `T`'s wire name
pub fn erased<T, C>(kind: CodecKind, codec: C) -> Arc<dyn ErasedCodec>
where
    T: Persist,
    C: Codec<T>,
{
    Arc::new(TypedCodec::<T, C>::new(T::type_name(), kind, codec))
}

//! Codec registry
//!
//! Central lookup from runtime type to codec. Resolution order:
//!
//! 1. A codec already cached for the `TypeId` (built-ins are cached at
//!    construction, [`Registry::register`] overrides go straight in)
//! 2. Otherwise [`Persist::build_codec`] builds one: enums, arrays, lists,
//!    maps and options supply their composite codecs, schema types supply a
//!    structural codec, and everything else fails with
//!    `Error::NotSerializable`
//!
//! Built codecs are cached by `TypeId` and indexed by wire type name, so the
//! tagged reader and the save store can resolve type names found in storage.
//!
//! # Thread Safety
//!
//! Both caches are `DashMap`s. Resolution never holds a shard lock while a
//! codec is being built, so codecs may resolve their members recursively.
//! Two threads racing to build the same codec keep whichever was cached first.

use crate::codec::{Codec, CodecKind, ErasedCodec, SerializationMode, TypedCodec};
use crate::persist::Persist;
use crate::primitive;
use dashmap::DashMap;
use keystash_core::{BinaryReader, BinaryWriter, Diagnostics, DynValue, Error, Result};
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::debug;

/// Registry of codecs, shared by every component of one store
pub struct Registry {
    by_type: DashMap<TypeId, Arc<dyn ErasedCodec>>,
    by_name: DashMap<String, Arc<dyn ErasedCodec>>,
    mode: SerializationMode,
    diagnostics: Arc<Diagnostics>,
}

impl Registry {
    /// Registry with all built-in codecs, tagged mode and its own diagnostics
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(Diagnostics::default()))
    }

    /// Registry reporting warnings to a shared diagnostics sink
    pub fn with_diagnostics(diagnostics: Arc<Diagnostics>) -> Self {
        let registry = Registry {
            by_type: DashMap::new(),
            by_name: DashMap::new(),
            mode: SerializationMode::default(),
            diagnostics,
        };
        primitive::register_builtins(&registry);
        registry
    }

    /// Set the default structural layout
    ///
    /// Only affects codecs built afterwards; schemas may still override it.
    pub fn with_mode(mut self, mode: SerializationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Default structural layout
    pub fn mode(&self) -> SerializationMode {
        self.mode
    }

    /// Diagnostics sink for recoverable warnings
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub(crate) fn insert_builtin<T: Persist>(&self) {
        if let Ok(codec) = T::build_codec(self) {
            self.by_name
                .insert(codec.type_name().to_string(), Arc::clone(&codec));
            self.by_type.insert(TypeId::of::<T>(), codec);
        }
    }

    /// Register an explicit codec for `T`, replacing any cached one
    pub fn register<T, C>(&self, codec: C)
    where
        T: Persist,
        C: Codec<T>,
    {
        let erased: Arc<dyn ErasedCodec> =
            Arc::new(TypedCodec::<T, C>::new(T::type_name(), CodecKind::Custom, codec));
        self.insert_codec(TypeId::of::<T>(), erased);
    }

    /// Register an already-erased codec for `T`
    ///
    /// Fails if the codec handles a different runtime type.
    pub fn register_erased<T: Persist>(&self, codec: Arc<dyn ErasedCodec>) -> Result<()> {
        if codec.value_type() != TypeId::of::<T>() {
            return Err(Error::ValueTypeMismatch {
                expected: T::type_name(),
            });
        }
        self.insert_codec(TypeId::of::<T>(), codec);
        Ok(())
    }

    fn insert_codec(&self, type_id: TypeId, codec: Arc<dyn ErasedCodec>) {
        debug!(
            target: "keystash::registry",
            type_name = codec.type_name(),
            kind = ?codec.kind(),
            "Registered codec"
        );
        self.by_name
            .insert(codec.type_name().to_string(), Arc::clone(&codec));
        self.by_type.insert(type_id, codec);
    }

    /// Resolve the codec for `T`, building and caching it on first use
    pub fn resolve<T: Persist>(&self) -> Result<Arc<dyn ErasedCodec>> {
        let type_id = TypeId::of::<T>();
        if let Some(codec) = self.by_type.get(&type_id) {
            return Ok(Arc::clone(codec.value()));
        }

        let built = T::build_codec(self)?;
        if built.value_type() != type_id {
            return Err(Error::ValueTypeMismatch {
                expected: T::type_name(),
            });
        }

        let codec = Arc::clone(self.by_type.entry(type_id).or_insert(built).value());
        self.by_name
            .entry(codec.type_name().to_string())
            .or_insert_with(|| Arc::clone(&codec));

        debug!(
            target: "keystash::registry",
            type_name = codec.type_name(),
            kind = ?codec.kind(),
            version = codec.version(),
            "Resolved codec"
        );
        Ok(codec)
    }

    /// Resolve a codec by wire type name
    ///
    /// Only types already resolved or registered in this registry are known.
    pub fn resolve_name(&self, type_name: &str) -> Result<Arc<dyn ErasedCodec>> {
        self.by_name
            .get(type_name)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| Error::UnresolvableType(type_name.to_string()))
    }

    /// Whether a wire type name is known
    pub fn contains_name(&self, type_name: &str) -> bool {
        self.by_name.contains_key(type_name)
    }

    /// All known wire type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Schema version of `T`'s codec
    pub fn version<T: Persist>(&self) -> Result<u32> {
        Ok(self.resolve::<T>()?.version())
    }

    /// Write a value through its codec
    pub fn write<T: Persist>(&self, writer: &mut BinaryWriter, value: &T) -> Result<()> {
        self.resolve::<T>()?.write_any(self, writer, value)
    }

    /// Read a value through its codec
    pub fn read<T: Persist>(&self, reader: &mut BinaryReader<'_>) -> Result<T> {
        let boxed = self.resolve::<T>()?.read_any(self, reader)?;
        downcast_box(boxed)
    }

    /// Serialize a value to a standalone buffer
    pub fn serialize<T: Persist>(&self, value: &T) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.write(&mut writer, value)?;
        Ok(writer.into_bytes())
    }

    /// Deserialize a value from a standalone buffer
    ///
    /// Trailing bytes after the value are ignored.
    pub fn deserialize<T: Persist>(&self, bytes: &[u8]) -> Result<T> {
        self.read(&mut BinaryReader::new(bytes))
    }

    /// Serialize a type-erased value with the given codec
    pub fn serialize_erased(&self, codec: &dyn ErasedCodec, value: &dyn Any) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        codec.write_any(self, &mut writer, value)?;
        Ok(writer.into_bytes())
    }

    /// Deserialize a type-erased value with the given codec
    pub fn deserialize_erased(
        &self,
        codec: &dyn ErasedCodec,
        bytes: &[u8],
    ) -> Result<Box<dyn Any + Send>> {
        codec.read_any(self, &mut BinaryReader::new(bytes))
    }

    /// Type-neutral form of a value, if its type has one
    pub fn to_dynamic<T: Persist>(&self, value: &T) -> Result<Option<DynValue>> {
        Ok(self.resolve::<T>()?.to_dynamic_any(self, value))
    }

    /// Raise a type-neutral value into `T`
    pub fn from_dynamic<T: Persist>(&self, value: &DynValue) -> Result<T> {
        let boxed = self.resolve::<T>()?.from_dynamic_any(self, value)?;
        downcast_box(boxed)
    }

    /// String form of a value; the wire type name when it has no better one
    pub fn render<T: Persist>(&self, value: &T) -> String {
        match self.resolve::<T>() {
            Ok(codec) => codec.render_any(self, value),
            Err(_) => T::type_name(),
        }
    }

    /// Read a value stored under `type_name` and render it as a string
    ///
    /// Every readable value has a string form, so this only fails when the
    /// bytes cannot be read.
    pub fn read_rendered_named(
        &self,
        type_name: &str,
        reader: &mut BinaryReader<'_>,
    ) -> Result<String> {
        if let Ok(codec) = self.resolve_name(type_name) {
            let value = codec.read_any(self, reader)?;
            return Ok(codec.render_any(self, &*value));
        }
        match option_inner(type_name) {
            Some(inner) => {
                if reader.read_bool()? {
                    self.read_rendered_named(inner, reader)
                } else {
                    Ok(DynValue::Null.to_string())
                }
            }
            None => Err(Error::UnresolvableType(type_name.to_string())),
        }
    }

    /// Read a value stored under `type_name` and lower it to its type-neutral form
    ///
    /// `Option<..>` names that were never resolved locally are still readable
    /// when their inner type is known.
    pub fn read_dynamic_named(
        &self,
        type_name: &str,
        reader: &mut BinaryReader<'_>,
    ) -> Result<DynValue> {
        if let Ok(codec) = self.resolve_name(type_name) {
            return codec.read_dynamic(self, reader);
        }
        match option_inner(type_name) {
            Some(inner) => {
                if reader.read_bool()? {
                    self.read_dynamic_named(inner, reader)
                } else {
                    Ok(DynValue::Null)
                }
            }
            None => Err(Error::UnresolvableType(type_name.to_string())),
        }
    }
}

/// `T` of an `Option<T>` wire name
pub(crate) fn option_inner(type_name: &str) -> Option<&str> {
    type_name
        .strip_prefix("Option<")
        .and_then(|rest| rest.strip_suffix('>'))
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("codecs", &self.by_type.len())
            .field("mode", &self.mode)
            .finish()
    }
}

fn downcast_box<T: Persist>(boxed: Box<dyn Any + Send>) -> Result<T> {
    boxed
        .downcast::<T>()
        .map(|b| *b)
        .map_err(|_| Error::ValueTypeMismatch {
            expected: T::type_name(),
        })
}

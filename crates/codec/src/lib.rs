//! Codecs for keystash
//!
//! This crate turns typed values into bytes and back:
//! - Persist: opt-in trait carrying a type's stable wire name
//! - Registry: codec lookup by type and by wire name
//! - Primitive, collection and enum codecs
//! - Structural codec: schema-driven tagged and compact layouts
//! - Value conversion between differently typed stored fields
//! - MigrationRegistry: version chains applied after deserialization

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod collections;
pub mod convert;
pub mod enumeration;
pub mod migration;
pub mod persist;
pub mod primitive;
pub mod registry;
pub mod structural;

pub use codec::{erased, Codec, CodecKind, ErasedCodec, SerializationMode, TypedCodec};
pub use collections::{ArrayCodec, ListCodec, MapCodec, OptionCodec};
pub use enumeration::{EnumCodec, PersistEnum};
pub use migration::{MigrationRegistry, Migrator};
pub use persist::Persist;
pub use primitive::{scalar_codec, Scalar, ScalarCodec};
pub use registry::Registry;
pub use structural::{
    Field, FieldOptions, Schema, SchemaBuilder, StructuralCodec, TAGGED_FORMAT_VERSION,
    TAGGED_MAGIC,
};

pub use keystash_core::{
    BinaryReader, BinaryWriter, Decimal, Diagnostic, Diagnostics, DynValue, Error, Result,
};

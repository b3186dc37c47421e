//! Structural codec
//!
//! Serializes a composite type from its [`Schema`] without hand-written code.
//! Two layouts are available:
//!
//! - **Tagged** ([`tagged`]): every member is written with its field id and
//!   declared type name. Reading tolerates added, removed, renamed (with a
//!   pinned id) and retyped members.
//! - **Compact** ([`compact`]): members are written positionally in schema
//!   order. Smaller, but reordering, renaming or adding members changes how
//!   existing data decodes.

pub mod compact;
pub mod schema;
pub mod tagged;

pub use schema::{Field, FieldOptions, Schema, SchemaBuilder};
pub use tagged::{TAGGED_FORMAT_VERSION, TAGGED_MAGIC};

use crate::codec::{Codec, SerializationMode};
use crate::persist::Persist;
use crate::registry::Registry;
use keystash_core::{BinaryReader, BinaryWriter, Diagnostic, Result};

/// Codec driven by a [`Schema`]
pub struct StructuralCodec<T> {
    schema: Schema<T>,
    mode: SerializationMode,
}

impl<T> StructuralCodec<T>
where
    T: Persist + Default,
{
    /// Build the codec, reporting duplicate field ids once per type
    pub fn new(schema: Schema<T>, registry: &Registry) -> Self {
        for id in schema.duplicate_ids() {
            registry.diagnostics().report_once(
                &format!("duplicate-field:{}:{}", schema.name(), id),
                Diagnostic::DuplicateFieldId {
                    type_name: schema.name().to_string(),
                    field_id: id,
                },
            );
        }
        let mode = schema.mode().unwrap_or(registry.mode());
        StructuralCodec { schema, mode }
    }

    /// Schema this codec was built from
    pub fn schema(&self) -> &Schema<T> {
        &self.schema
    }

    /// Layout this codec writes
    pub fn mode(&self) -> SerializationMode {
        self.mode
    }
}

impl<T> Codec<T> for StructuralCodec<T>
where
    T: Persist + Default,
{
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, value: &T) -> Result<()> {
        match self.mode {
            SerializationMode::Tagged => tagged::write(registry, writer, &self.schema, value),
            SerializationMode::Compact => compact::write(registry, writer, &self.schema, value),
        }
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<T> {
        match self.mode {
            SerializationMode::Tagged => tagged::read(registry, reader, &self.schema),
            SerializationMode::Compact => compact::read(registry, reader, &self.schema),
        }
    }

    fn version(&self) -> u32 {
        self.schema.version()
    }

    fn render(&self, registry: &Registry, value: &T) -> Option<String> {
        Some(self.schema.render(registry, value))
    }
}

//! Tagged structural layout
//!
//! ```text
//! MAGIC "KSTF" (4) | FORMAT_VERSION u32 (4) | FIELD_COUNT i32 (4, -1 = null instance)
//! FIELD_COUNT x ( FIELD_ID string | TYPE_NAME string | BLOB_LEN i32 + BLOB )
//! ```
//!
//! Each blob holds one member serialized on its own through the registry.
//! Reading matches stored fields to declared members by field id; members
//! with no stored field keep their default, stored fields with no member are
//! reported as unknown. A stored field whose type name differs from the
//! member's declared type goes through value conversion; if that fails the
//! member keeps its default and a warning is reported. Two cases skip the
//! type-neutral form: types that differ only in `Option` wrapping are read
//! directly, and any value converts to a `String` member through its
//! rendered form.

use crate::persist::Persist;
use crate::registry::{option_inner, Registry};
use crate::structural::schema::{Field, Schema};
use keystash_core::{BinaryReader, BinaryWriter, Diagnostic, DynValue, Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Magic marker at the start of every tagged payload
pub const TAGGED_MAGIC: [u8; 4] = *b"KSTF";

/// Current tagged format version
pub const TAGGED_FORMAT_VERSION: u32 = 1;

/// Wire name of `String`; every stored value converts to it
const STRING_TYPE_NAME: &str = "String";

/// Minimum bytes one stored field occupies (three length prefixes)
const MIN_FIELD_SIZE: usize = 12;

/// Header of a tagged payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedHeader {
    /// Format version found in the payload
    pub format_version: u32,
    /// Number of stored fields; `None` is the null instance
    pub field_count: Option<usize>,
}

/// Write a tagged header
pub fn write_header(writer: &mut BinaryWriter, field_count: Option<usize>) -> Result<()> {
    writer.write_magic(TAGGED_MAGIC);
    writer.write_u32(TAGGED_FORMAT_VERSION);
    match field_count {
        Some(n) => writer.write_len(n),
        None => {
            writer.write_null();
            Ok(())
        }
    }
}

/// Read and validate a tagged header
pub fn read_header(reader: &mut BinaryReader<'_>) -> Result<TaggedHeader> {
    let magic = reader.read_magic()?;
    if magic != TAGGED_MAGIC {
        return Err(Error::InvalidMagic {
            expected: TAGGED_MAGIC,
            found: magic,
        });
    }
    let format_version = reader.read_u32()?;
    if format_version == 0 || format_version > TAGGED_FORMAT_VERSION {
        return Err(Error::UnsupportedFormatVersion {
            found: format_version,
            supported: TAGGED_FORMAT_VERSION,
        });
    }
    let field_count = reader.read_len()?;
    Ok(TaggedHeader {
        format_version,
        field_count,
    })
}

/// A stored field, borrowed from the payload
#[derive(Debug, Clone, Copy)]
struct StoredField<'a> {
    type_name: &'a str,
    blob: &'a [u8],
}

/// Write `value` in the tagged layout
pub(crate) fn write<T: Persist>(
    registry: &Registry,
    writer: &mut BinaryWriter,
    schema: &Schema<T>,
    value: &T,
) -> Result<()> {
    write_header(writer, Some(schema.fields.len()))?;
    for field in &schema.fields {
        let mut blob = BinaryWriter::new();
        field.access.write(registry, &mut blob, value)?;
        writer.write_str(&field.id)?;
        writer.write_str(&field.type_name)?;
        writer.write_blob(blob.as_bytes())?;
    }
    Ok(())
}

/// Read a value in the tagged layout
pub(crate) fn read<T: Persist + Default>(
    registry: &Registry,
    reader: &mut BinaryReader<'_>,
    schema: &Schema<T>,
) -> Result<T> {
    let header = read_header(reader)?;
    let count = match header.field_count {
        None => return Ok(T::default()),
        Some(n) => n,
    };

    let mut stored: FxHashMap<String, StoredField<'_>> = FxHashMap::default();
    stored.reserve(count.min(reader.remaining() / MIN_FIELD_SIZE));
    for _ in 0..count {
        let id = reader.read_string()?;
        let type_name = read_str_slice(reader)?;
        let blob = reader.read_opt_blob_slice()?.unwrap_or(&[]);
        stored.insert(id, StoredField { type_name, blob });
    }

    let mut value = T::default();
    let mut consumed: FxHashSet<&str> = FxHashSet::default();
    for field in &schema.fields {
        let Some(entry) = stored.get(field.id.as_str()) else {
            continue;
        };
        consumed.insert(field.id.as_str());
        if let Err(e) = assign(registry, field, *entry, &mut value) {
            registry
                .diagnostics()
                .report(Diagnostic::FieldConversionFailed {
                    type_name: schema.name.clone(),
                    field_id: field.id.clone(),
                    reason: e.to_string(),
                });
        }
    }

    if consumed.len() < stored.len() {
        let mut unknown: Vec<String> = stored
            .keys()
            .filter(|id| !consumed.contains(id.as_str()))
            .cloned()
            .collect();
        unknown.sort();
        registry.diagnostics().report(Diagnostic::UnknownFields {
            type_name: schema.name.clone(),
            field_ids: unknown,
        });
    }

    Ok(value)
}

/// Borrow a length-prefixed UTF-8 string; null reads as empty
fn read_str_slice<'a>(reader: &mut BinaryReader<'a>) -> Result<&'a str> {
    match reader.read_opt_blob_slice()? {
        None => Ok(""),
        Some(bytes) => std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8),
    }
}

/// Strip every `Option<..>` layer from a wire name, counting the layers
fn unwrap_options(mut type_name: &str) -> (&str, usize) {
    let mut depth = 0;
    while let Some(inner) = option_inner(type_name) {
        type_name = inner;
        depth += 1;
    }
    (type_name, depth)
}

fn assign<T>(
    registry: &Registry,
    field: &Field<T>,
    stored: StoredField<'_>,
    owner: &mut T,
) -> Result<()> {
    let mut reader = BinaryReader::new(stored.blob);
    if stored.type_name == field.type_name {
        return field.access.read(registry, &mut reader, owner);
    }

    let (stored_base, stored_depth) = unwrap_options(stored.type_name);
    let (declared_base, declared_depth) = unwrap_options(&field.type_name);
    if stored_base == declared_base {
        debug!(
            target: "keystash::codec",
            field_id = %field.id,
            stored = stored.type_name,
            declared = %field.type_name,
            "Re-wrapping optional stored field"
        );
        if stored_depth > declared_depth {
            // Peel presence flags; an absent value keeps the member default
            for _ in declared_depth..stored_depth {
                if !reader.read_bool()? {
                    return Ok(());
                }
            }
            return field.access.read(registry, &mut reader, owner);
        }
        let mut wrapped = BinaryWriter::with_capacity(stored.blob.len() + declared_depth);
        for _ in stored_depth..declared_depth {
            wrapped.write_bool(true);
        }
        wrapped.write_raw(stored.blob);
        let bytes = wrapped.into_bytes();
        return field
            .access
            .read(registry, &mut BinaryReader::new(&bytes), owner);
    }

    debug!(
        target: "keystash::codec",
        field_id = %field.id,
        stored = stored.type_name,
        declared = %field.type_name,
        "Converting stored field"
    );
    if declared_base == STRING_TYPE_NAME && declared_depth <= 1 {
        let text = registry.read_rendered_named(stored.type_name, &mut reader)?;
        return field
            .access
            .assign_dynamic(registry, &DynValue::String(text), owner);
    }
    let value = registry.read_dynamic_named(stored.type_name, &mut reader)?;
    field.access.assign_dynamic(registry, &value, owner)
}

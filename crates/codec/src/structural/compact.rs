//! Compact structural layout
//!
//! ```text
//! [PRESENT bool]  (only when the schema is null-aware)
//! member_0 | member_1 | ... | member_n   (schema order, no ids, no type names)
//! ```
//!
//! There is no per-member framing, so every member must decode with exactly
//! the codec it was written with. Errors propagate instead of falling back.

use crate::persist::Persist;
use crate::registry::Registry;
use crate::structural::schema::Schema;
use keystash_core::{BinaryReader, BinaryWriter, Result};

/// Write `value` positionally
pub(crate) fn write<T: Persist>(
    registry: &Registry,
    writer: &mut BinaryWriter,
    schema: &Schema<T>,
    value: &T,
) -> Result<()> {
    if schema.null_aware {
        writer.write_bool(true);
    }
    for field in &schema.fields {
        field.access.write(registry, writer, value)?;
    }
    Ok(())
}

/// Read a value positionally
pub(crate) fn read<T: Persist + Default>(
    registry: &Registry,
    reader: &mut BinaryReader<'_>,
    schema: &Schema<T>,
) -> Result<T> {
    let mut value = T::default();
    if schema.null_aware && !reader.read_bool()? {
        return Ok(value);
    }
    for field in &schema.fields {
        field.access.read(registry, reader, &mut value)?;
    }
    Ok(value)
}

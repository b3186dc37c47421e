//! Composite codecs: arrays, lists, maps and optional values
//!
//! Arrays, lists and maps write an `i32` element count followed by each
//! element through the registry, so nesting is unbounded. A count of `-1` is
//! the null sentinel; Rust collections are never null, so readers turn it into
//! an empty collection. Optional values write one presence flag followed by
//! the wrapped value when present.
//!
//! Map entries are written in iteration order, which is unspecified for
//! `HashMap`. Readers never depend on key order.

use crate::codec::{erased, Codec, CodecKind, ErasedCodec};
use crate::persist::Persist;
use crate::registry::Registry;
use keystash_core::{BinaryReader, BinaryWriter, DynValue, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Bound preallocation by the bytes left; a corrupt count must not allocate
/// gigabytes before the read fails
fn capacity_hint(count: usize, reader: &BinaryReader<'_>) -> usize {
    count.min(reader.remaining())
}

fn write_seq<'v, T: Persist>(
    registry: &Registry,
    writer: &mut BinaryWriter,
    len: usize,
    items: impl Iterator<Item = &'v T>,
) -> Result<()> {
    writer.write_len(len)?;
    for item in items {
        registry.write(writer, item)?;
    }
    Ok(())
}

fn read_seq<T: Persist>(registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<Vec<T>> {
    let count = match reader.read_len()? {
        None => return Ok(Vec::new()),
        Some(n) => n,
    };
    let mut items = Vec::with_capacity(capacity_hint(count, reader));
    for _ in 0..count {
        items.push(registry.read::<T>(reader)?);
    }
    Ok(items)
}

fn read_pairs<K: Persist, V: Persist>(
    registry: &Registry,
    reader: &mut BinaryReader<'_>,
    mut insert: impl FnMut(K, V),
) -> Result<()> {
    let count = match reader.read_len()? {
        None => return Ok(()),
        Some(n) => n,
    };
    for _ in 0..count {
        let key = registry.read::<K>(reader)?;
        let value = registry.read::<V>(reader)?;
        insert(key, value);
    }
    Ok(())
}

/// `[a, b, c]`
fn render_seq<'v, T: Persist>(registry: &Registry, items: impl Iterator<Item = &'v T>) -> String {
    let parts: Vec<String> = items.map(|item| registry.render(item)).collect();
    format!("[{}]", parts.join(", "))
}

/// `{k: v, ...}`
fn render_pairs<'v, K: Persist, V: Persist>(
    registry: &Registry,
    pairs: impl Iterator<Item = (&'v K, &'v V)>,
) -> String {
    let parts: Vec<String> = pairs
        .map(|(k, v)| format!("{}: {}", registry.render(k), registry.render(v)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// Codec for `Box<[T]>`, wire name `Array<T>`
pub struct ArrayCodec<T>(PhantomData<fn() -> T>);

impl<T: Persist> Codec<Box<[T]>> for ArrayCodec<T> {
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, value: &Box<[T]>) -> Result<()> {
        write_seq(registry, writer, value.len(), value.iter())
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<Box<[T]>> {
        Ok(read_seq(registry, reader)?.into_boxed_slice())
    }

    fn render(&self, registry: &Registry, value: &Box<[T]>) -> Option<String> {
        Some(render_seq(registry, value.iter()))
    }
}

impl<T: Persist> Persist for Box<[T]> {
    fn type_name() -> String {
        format!("Array<{}>", T::type_name())
    }

    fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(erased::<Self, _>(CodecKind::Array, ArrayCodec::<T>(PhantomData)))
    }
}

/// Codec for ordered lists, wire name `List<T>`
pub struct ListCodec<L>(PhantomData<fn() -> L>);

impl<T: Persist> Codec<Vec<T>> for ListCodec<Vec<T>> {
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, value: &Vec<T>) -> Result<()> {
        write_seq(registry, writer, value.len(), value.iter())
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<Vec<T>> {
        read_seq(registry, reader)
    }

    fn render(&self, registry: &Registry, value: &Vec<T>) -> Option<String> {
        Some(render_seq(registry, value.iter()))
    }
}

impl<T: Persist> Codec<VecDeque<T>> for ListCodec<VecDeque<T>> {
    fn write(
        &self,
        registry: &Registry,
        writer: &mut BinaryWriter,
        value: &VecDeque<T>,
    ) -> Result<()> {
        write_seq(registry, writer, value.len(), value.iter())
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<VecDeque<T>> {
        Ok(read_seq(registry, reader)?.into())
    }

    fn render(&self, registry: &Registry, value: &VecDeque<T>) -> Option<String> {
        Some(render_seq(registry, value.iter()))
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn type_name() -> String {
        format!("List<{}>", T::type_name())
    }

    fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(erased::<Self, _>(CodecKind::List, ListCodec::<Self>(PhantomData)))
    }
}

// Same wire name and layout as Vec<T>
impl<T: Persist> Persist for VecDeque<T> {
    fn type_name() -> String {
        format!("List<{}>", T::type_name())
    }

    fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(erased::<Self, _>(CodecKind::List, ListCodec::<Self>(PhantomData)))
    }
}

/// Codec for associative maps, wire name `Map<K,V>`
pub struct MapCodec<M>(PhantomData<fn() -> M>);

impl<K, V> Codec<HashMap<K, V>> for MapCodec<HashMap<K, V>>
where
    K: Persist + Eq + Hash,
    V: Persist,
{
    fn write(
        &self,
        registry: &Registry,
        writer: &mut BinaryWriter,
        value: &HashMap<K, V>,
    ) -> Result<()> {
        writer.write_len(value.len())?;
        for (k, v) in value {
            registry.write(writer, k)?;
            registry.write(writer, v)?;
        }
        Ok(())
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<HashMap<K, V>> {
        let mut map = HashMap::new();
        read_pairs(registry, reader, |k, v| {
            map.insert(k, v);
        })?;
        Ok(map)
    }

    fn render(&self, registry: &Registry, value: &HashMap<K, V>) -> Option<String> {
        Some(render_pairs(registry, value.iter()))
    }
}

impl<K, V> Codec<BTreeMap<K, V>> for MapCodec<BTreeMap<K, V>>
where
    K: Persist + Ord,
    V: Persist,
{
    fn write(
        &self,
        registry: &Registry,
        writer: &mut BinaryWriter,
        value: &BTreeMap<K, V>,
    ) -> Result<()> {
        writer.write_len(value.len())?;
        for (k, v) in value {
            registry.write(writer, k)?;
            registry.write(writer, v)?;
        }
        Ok(())
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<BTreeMap<K, V>> {
        let mut map = BTreeMap::new();
        read_pairs(registry, reader, |k, v| {
            map.insert(k, v);
        })?;
        Ok(map)
    }

    fn render(&self, registry: &Registry, value: &BTreeMap<K, V>) -> Option<String> {
        Some(render_pairs(registry, value.iter()))
    }
}

impl<K, V> Persist for HashMap<K, V>
where
    K: Persist + Eq + Hash,
    V: Persist,
{
    fn type_name() -> String {
        format!("Map<{},{}>", K::type_name(), V::type_name())
    }

    fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(erased::<Self, _>(CodecKind::Map, MapCodec::<Self>(PhantomData)))
    }
}

impl<K, V> Persist for BTreeMap<K, V>
where
    K: Persist + Ord,
    V: Persist,
{
    fn type_name() -> String {
        format!("Map<{},{}>", K::type_name(), V::type_name())
    }

    fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(erased::<Self, _>(CodecKind::Map, MapCodec::<Self>(PhantomData)))
    }
}

/// Codec for `Option<T>`, wire name `Option<T>`
///
/// Conversions see through the option: `None` lowers to [`DynValue::Null`]
/// and `Some(v)` lowers to `v`'s own form.
pub struct OptionCodec<T>(PhantomData<fn() -> T>);

impl<T: Persist> Codec<Option<T>> for OptionCodec<T> {
    fn write(
        &self,
        registry: &Registry,
        writer: &mut BinaryWriter,
        value: &Option<T>,
    ) -> Result<()> {
        writer.write_bool(value.is_some());
        match value {
            Some(inner) => registry.write(writer, inner),
            None => Ok(()),
        }
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<Option<T>> {
        if reader.read_bool()? {
            registry.read::<T>(reader).map(Some)
        } else {
            Ok(None)
        }
    }

    fn to_dynamic(&self, registry: &Registry, value: &Option<T>) -> Option<DynValue> {
        match value {
            None => Some(DynValue::Null),
            Some(inner) => registry.to_dynamic(inner).ok().flatten(),
        }
    }

    fn from_dynamic(&self, registry: &Registry, value: &DynValue) -> Result<Option<T>> {
        match value {
            DynValue::Null => Ok(None),
            other => registry.from_dynamic::<T>(other).map(Some),
        }
    }

    fn render(&self, registry: &Registry, value: &Option<T>) -> Option<String> {
        Some(match value {
            None => DynValue::Null.to_string(),
            Some(inner) => registry.render(inner),
        })
    }
}

impl<T: Persist> Persist for Option<T> {
    fn type_name() -> String {
        format!("Option<{}>", T::type_name())
    }

    fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(erased::<Self, _>(CodecKind::Optional, OptionCodec::<T>(PhantomData)))
    }
}

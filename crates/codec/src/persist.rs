//! Persistable types
//!
//! A type takes part in persistence by implementing [`Persist`]. The wire type
//! name is chosen explicitly and must stay stable across releases; it is what
//! the tagged format and the entry envelope record. Types opt in to a codec by
//! overriding [`Persist::build_codec`] (usually with a [`Schema`] or
//! [`EnumCodec`]) or by registering one with [`Registry::register`].
//!
//! [`Schema`]: crate::structural::Schema
//! [`EnumCodec`]: crate::enumeration::EnumCodec

use crate::codec::ErasedCodec;
use crate::registry::Registry;
use keystash_core::{Error, Result};
use std::sync::Arc;

/// A type that can be stored through the registry
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct Player {
///     level: u32,
///     gold: u64,
/// }
///
/// impl Persist for Player {
///     fn type_name() -> String {
///         "Player".to_string()
///     }
///
///     fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
///         Ok(Schema::<Player>::builder(Self::type_name())
///             .field("level", |p| &p.level, |p, v| p.level = v)
///             .field("gold", |p| &p.gold, |p, v| p.gold = v)
///             .into_codec(registry))
///     }
/// }
/// ```
pub trait Persist: Send + Sized + 'static {
    /// Stable wire type name
    fn type_name() -> String;

    /// Build the codec for this type
    ///
    /// Called at most once per registry; the result is cached. The default
    /// refuses, so a type without a schema or registered codec fails with
    /// [`Error::NotSerializable`].
    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        let _ = registry;
        Err(Error::NotSerializable(Self::type_name()))
    }
}

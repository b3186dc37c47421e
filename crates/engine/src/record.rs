//! In-memory records
//!
//! A [`Record`] is one live slot: the current value, type-erased, plus its
//! dirty flag. [`KnownKey`] remembers how to rebuild a record from scratch so
//! `delete_all` can reseed every key it has seen.
//!
//! # Materialization
//!
//! When a key is first registered and storage holds an entry for it:
//!
//! | Stored entry                              | Result                        |
//! |-------------------------------------------|-------------------------------|
//! | type name unknown to the registry         | default, clean, warning       |
//! | type name differs from the key's type     | default, clean, warning       |
//! | payload fails to decode                   | default, clean, warning       |
//! | older data version, migration succeeds    | migrated value, dirty         |
//! | older data version, migration fails       | default, clean, warning       |
//! | same or newer data version                | stored value, clean           |
//!
//! Fallback records stay clean so the unreadable file is only replaced once
//! the application actually changes the value.

use keystash_codec::{ErasedCodec, MigrationRegistry, Persist, Registry};
use keystash_core::{Diagnostic, Error, Result};
use keystash_durability::EntryPayload;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::debug;

use crate::key::Key;

type ErasedDefault = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// What the store needs to rebuild a key's record
#[derive(Clone)]
pub(crate) struct KnownKey {
    pub(crate) value_type: TypeId,
    pub(crate) codec: Arc<dyn ErasedCodec>,
    default: ErasedDefault,
}

impl KnownKey {
    pub(crate) fn new<T: Persist>(key: &Key<T>, codec: Arc<dyn ErasedCodec>) -> Self {
        let factory = key.default_factory();
        KnownKey {
            value_type: TypeId::of::<T>(),
            codec,
            default: Arc::new(move || Box::new(factory()) as Box<dyn Any + Send>),
        }
    }

    pub(crate) fn type_name(&self) -> &str {
        self.codec.type_name()
    }

    /// A fresh record holding the default value
    pub(crate) fn default_record(&self, id: &str, dirty: bool) -> Record {
        Record {
            id: id.to_string(),
            value_type: self.value_type,
            codec: Arc::clone(&self.codec),
            value: (self.default)(),
            dirty,
        }
    }

    /// Fail if `T` is not the type this key was first used with
    pub(crate) fn check_type<T: Persist>(&self, id: &str) -> Result<()> {
        if self.value_type == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(Error::KeyTypeMismatch {
                key: id.to_string(),
                existing: self.type_name().to_string(),
                requested: T::type_name(),
            })
        }
    }
}

/// One live value
pub(crate) struct Record {
    pub(crate) id: String,
    pub(crate) value_type: TypeId,
    pub(crate) codec: Arc<dyn ErasedCodec>,
    pub(crate) value: Box<dyn Any + Send>,
    pub(crate) dirty: bool,
}

impl Record {
    pub(crate) fn get<T: Persist>(&self) -> Result<&T> {
        self.value
            .downcast_ref::<T>()
            .ok_or_else(|| self.mismatch::<T>())
    }

    pub(crate) fn get_mut<T: Persist>(&mut self) -> Result<&mut T> {
        if self.value_type != TypeId::of::<T>() {
            return Err(self.mismatch::<T>());
        }
        match self.value.downcast_mut::<T>() {
            Some(value) => Ok(value),
            None => Err(Error::ValueTypeMismatch {
                expected: T::type_name(),
            }),
        }
    }

    /// Encode the current value into an entry
    pub(crate) fn to_entry(&self, registry: &Registry) -> Result<EntryPayload> {
        let payload = registry.serialize_erased(&*self.codec, &*self.value)?;
        Ok(EntryPayload::new(
            self.id.clone(),
            self.codec.type_name(),
            self.codec.version(),
            payload,
        ))
    }

    fn mismatch<T: Persist>(&self) -> Error {
        Error::KeyTypeMismatch {
            key: self.id.clone(),
            existing: self.codec.type_name().to_string(),
            requested: T::type_name(),
        }
    }
}

/// Build a record from a stored entry, falling back to the default
pub(crate) fn materialize(
    registry: &Registry,
    migrations: &MigrationRegistry,
    known: &KnownKey,
    entry: EntryPayload,
) -> Record {
    let id = entry.key.as_str();
    let declared = known.type_name();
    let diagnostics = registry.diagnostics();

    if entry.type_name != declared {
        let diagnostic = if registry.contains_name(&entry.type_name) {
            Diagnostic::StoredTypeMismatch {
                key: id.to_string(),
                stored: entry.type_name.clone(),
                declared: declared.to_string(),
            }
        } else {
            Diagnostic::UnresolvableStoredType {
                context: id.to_string(),
                type_name: entry.type_name.clone(),
            }
        };
        diagnostics.report(diagnostic);
        return known.default_record(id, false);
    }

    let mut value = match registry.deserialize_erased(&*known.codec, &entry.payload) {
        Ok(value) => value,
        Err(e) => {
            diagnostics.report(Diagnostic::DeserializeFailed {
                key: id.to_string(),
                reason: e.to_string(),
            });
            return known.default_record(id, false);
        }
    };

    let current = known.codec.version();
    let stored = entry.data_version;
    let mut dirty = false;
    if stored < current {
        let target: &mut dyn Any = &mut *value;
        if let Err(e) = migrations.migrate(declared, stored, current, target) {
            diagnostics.report(Diagnostic::MigrationFailed {
                key: id.to_string(),
                type_name: declared.to_string(),
                from: stored,
                to: current,
                reason: e.to_string(),
            });
            return known.default_record(id, false);
        }
        debug!(
            target: "keystash::store",
            key = id,
            from = stored,
            to = current,
            "Migrated stored value"
        );
        dirty = true;
    } else if stored > current {
        debug!(
            target: "keystash::store",
            key = id,
            stored,
            current,
            "Stored data version is newer than the codec; loading as is"
        );
    }

    Record {
        id: id.to_string(),
        value_type: known.value_type,
        codec: Arc::clone(&known.codec),
        value,
        dirty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_codec::{Migrator, Schema};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Stats {
        hp: i32,
    }

    impl Persist for Stats {
        fn type_name() -> String {
            "Stats".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<Stats>::builder("Stats")
                .version(2)
                .field("hp", |s| &s.hp, |s, v| s.hp = v)
                .into_codec(registry))
        }
    }

    fn known(registry: &Registry) -> KnownKey {
        let key = Key::with_default("stats", || Stats { hp: 100 });
        KnownKey::new(&key, registry.resolve::<Stats>().unwrap())
    }

    fn stored(registry: &Registry, hp: i32, version: u32) -> EntryPayload {
        let payload = registry.serialize(&Stats { hp }).unwrap();
        EntryPayload::new("stats", "Stats", version, payload)
    }

    #[test]
    fn test_current_version_loads_clean() {
        let registry = Registry::new();
        let known = known(&registry);
        let record = materialize(
            &registry,
            &MigrationRegistry::new(),
            &known,
            stored(&registry, 7, 2),
        );
        assert_eq!(record.get::<Stats>().unwrap().hp, 7);
        assert!(!record.dirty);
    }

    #[test]
    fn test_older_version_is_migrated_and_dirty() {
        let registry = Registry::new();
        let known = known(&registry);
        let migrations = MigrationRegistry::new();
        migrations.register(Migrator::new::<Stats, _>(1, 2, |s| s.hp *= 10).unwrap());

        let record = materialize(&registry, &migrations, &known, stored(&registry, 7, 1));
        assert_eq!(record.get::<Stats>().unwrap().hp, 70);
        assert!(record.dirty);
    }

    #[test]
    fn test_missing_migrator_falls_back() {
        let registry = Registry::new();
        let known = known(&registry);
        let record = materialize(
            &registry,
            &MigrationRegistry::new(),
            &known,
            stored(&registry, 7, 1),
        );
        assert_eq!(record.get::<Stats>().unwrap().hp, 100);
        assert!(!record.dirty);
        assert!(registry
            .diagnostics()
            .any(|d| matches!(d, Diagnostic::MigrationFailed { from: 1, to: 2, .. })));
    }

    #[test]
    fn test_newer_version_loads_as_is() {
        let registry = Registry::new();
        let known = known(&registry);
        let record = materialize(
            &registry,
            &MigrationRegistry::new(),
            &known,
            stored(&registry, 7, 9),
        );
        assert_eq!(record.get::<Stats>().unwrap().hp, 7);
    }

    #[test]
    fn test_unknown_type_name_falls_back() {
        let registry = Registry::new();
        let known = known(&registry);
        let entry = EntryPayload::new("stats", "LegacyStats", 1, vec![0; 4]);
        let record = materialize(&registry, &MigrationRegistry::new(), &known, entry);
        assert_eq!(record.get::<Stats>().unwrap().hp, 100);
        assert!(registry.diagnostics().any(|d| matches!(
            d,
            Diagnostic::UnresolvableStoredType { type_name, .. } if type_name == "LegacyStats"
        )));
    }

    #[test]
    fn test_known_but_different_type_falls_back() {
        let registry = Registry::new();
        let known = known(&registry);
        let entry = EntryPayload::new("stats", "i32", 1, 5i32.to_le_bytes().to_vec());
        let record = materialize(&registry, &MigrationRegistry::new(), &known, entry);
        assert_eq!(record.get::<Stats>().unwrap().hp, 100);
        assert!(registry
            .diagnostics()
            .any(|d| matches!(d, Diagnostic::StoredTypeMismatch { .. })));
    }

    #[test]
    fn test_corrupt_payload_falls_back() {
        let registry = Registry::new();
        let known = known(&registry);
        let entry = EntryPayload::new("stats", "Stats", 2, b"junk".to_vec());
        let record = materialize(&registry, &MigrationRegistry::new(), &known, entry);
        assert_eq!(record.get::<Stats>().unwrap().hp, 100);
        assert!(registry
            .diagnostics()
            .any(|d| matches!(d, Diagnostic::DeserializeFailed { .. })));
    }

    #[test]
    fn test_wrong_type_access() {
        let registry = Registry::new();
        let known = known(&registry);
        let mut record = known.default_record("stats", true);
        assert!(matches!(
            record.get::<u32>(),
            Err(Error::KeyTypeMismatch { .. })
        ));
        assert!(record.get_mut::<u32>().is_err());
        assert!(known.check_type::<u32>("stats").is_err());
        assert!(known.check_type::<Stats>("stats").is_ok());
    }
}

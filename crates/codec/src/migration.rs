//! Version migration
//!
//! A [`Migrator`] upgrades a value of one type from one data version to a
//! later one. Migrators for a type form a chain keyed by their source
//! version; [`MigrationRegistry::migrate`] walks that chain from the stored
//! version to the codec's current version.
//!
//! The whole path is resolved before any transform runs, so a gap leaves the
//! value untouched.

use crate::persist::Persist;
use keystash_core::{Error, Result};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type Transform = Arc<dyn Fn(&mut dyn Any) -> Result<()> + Send + Sync>;

/// One step of a migration chain
#[derive(Clone)]
pub struct Migrator {
    type_name: String,
    value_type: TypeId,
    from: u32,
    to: u32,
    transform: Transform,
}

impl Migrator {
    /// Migrator for `T` from `from` to `to`
    ///
    /// Fails with `InvalidConfig` unless `to > from`.
    pub fn new<T, F>(from: u32, to: u32, transform: F) -> Result<Self>
    where
        T: Persist,
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        if to <= from {
            return Err(Error::InvalidConfig(format!(
                "migrator for '{}' must advance the version (got {} -> {})",
                T::type_name(),
                from,
                to
            )));
        }
        let type_name = T::type_name();
        let expected = type_name.clone();
        let transform: Transform = Arc::new(move |value: &mut dyn Any| {
            let value = value
                .downcast_mut::<T>()
                .ok_or_else(|| Error::ValueTypeMismatch {
                    expected: expected.clone(),
                })?;
            transform(value);
            Ok(())
        });
        Ok(Migrator {
            type_name,
            value_type: TypeId::of::<T>(),
            from,
            to,
            transform,
        })
    }

    /// Wire name of the migrated type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Source version
    pub fn from_version(&self) -> u32 {
        self.from
    }

    /// Target version
    pub fn to_version(&self) -> u32 {
        self.to
    }

    /// Apply the transform to a value of the migrated type
    pub fn apply(&self, value: &mut dyn Any) -> Result<()> {
        (self.transform)(value)
    }
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("type_name", &self.type_name)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Migration chains for every type, keyed by wire type name
#[derive(Default)]
pub struct MigrationRegistry {
    chains: RwLock<HashMap<String, BTreeMap<u32, Migrator>>>,
}

impl MigrationRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a migrator; an existing one with the same source version is replaced
    pub fn register(&self, migrator: Migrator) {
        let mut chains = self.chains.write();
        let chain = chains.entry(migrator.type_name.clone()).or_default();
        if let Some(previous) = chain.insert(migrator.from, migrator) {
            warn!(
                target: "keystash::migration",
                type_name = %previous.type_name,
                from = previous.from,
                "Replaced existing migrator"
            );
        }
    }

    /// Whether `type_name` can be migrated from `from` to `to`
    pub fn has_chain(&self, type_name: &str, from: u32, to: u32) -> bool {
        self.path(type_name, from, to).is_ok()
    }

    /// Migrators registered for a type, sorted by source version
    pub fn migrators_for(&self, type_name: &str) -> Vec<Migrator> {
        self.chains
            .read()
            .get(type_name)
            .map(|chain| chain.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Upgrade `value` in place from version `from` to version `to`
    ///
    /// A gap in the chain fails with [`Error::MissingMigrator`] before any
    /// transform has run.
    pub fn migrate(&self, type_name: &str, from: u32, to: u32, value: &mut dyn Any) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let path = self.path(type_name, from, to)?;
        for step in &path {
            if (*value).type_id() != step.value_type {
                return Err(Error::ValueTypeMismatch {
                    expected: step.type_name.clone(),
                });
            }
            step.apply(value)?;
            debug!(
                target: "keystash::migration",
                type_name,
                from = step.from,
                to = step.to,
                "Applied migrator"
            );
        }
        Ok(())
    }

    /// Typed form of [`MigrationRegistry::migrate`]
    pub fn migrate_typed<T: Persist>(&self, from: u32, to: u32, value: &mut T) -> Result<()> {
        self.migrate(&T::type_name(), from, to, value)
    }

    fn path(&self, type_name: &str, from: u32, to: u32) -> Result<Vec<Migrator>> {
        let missing = |at: u32| Error::MissingMigrator {
            type_name: type_name.to_string(),
            from: at,
            target: to,
        };
        if from > to {
            return Err(missing(from));
        }

        let chains = self.chains.read();
        let chain = chains.get(type_name);
        let mut path = Vec::new();
        let mut current = from;
        while current < to {
            let step = chain
                .and_then(|c| c.get(&current))
                .ok_or_else(|| missing(current))?;
            if step.to > to {
                return Err(Error::Corruption(format!(
                    "migrator for '{}' {} -> {} overshoots target version {}",
                    type_name, step.from, step.to, to
                )));
            }
            current = step.to;
            path.push(step.clone());
        }
        Ok(path)
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains = self.chains.read();
        let mut map = f.debug_map();
        for (name, chain) in chains.iter() {
            let steps: Vec<(u32, u32)> = chain.values().map(|m| (m.from, m.to)).collect();
            map.entry(name, &steps);
        }
        map.finish()
    }
}

//! Data version upgrades on load.

use crate::common::*;
use keystash::{Diagnostic, ErasedCodec, Key, Migrator, Persist, Registry, Result, Schema};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct HealthV1 {
    hp: i32,
}

impl Persist for HealthV1 {
    fn type_name() -> String {
        "Health".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<HealthV1>::builder(Self::type_name())
            .version(1)
            .field("hp", |h| &h.hp, |h, v| h.hp = v)
            .into_codec(registry))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Health {
    hp: i32,
    max_hp: i32,
    regen: i32,
}

impl Default for Health {
    fn default() -> Self {
        Health {
            hp: 100,
            max_hp: 100,
            regen: 1,
        }
    }
}

impl Persist for Health {
    fn type_name() -> String {
        "Health".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<Health>::builder(Self::type_name())
            .version(3)
            .field("hp", |h| &h.hp, |h, v| h.hp = v)
            .field("max_hp", |h| &h.max_hp, |h, v| h.max_hp = v)
            .field("regen", |h| &h.regen, |h, v| h.regen = v)
            .into_codec(registry))
    }
}

fn store_v1(test: &TestStore, hp: i32) {
    let store = test.open();
    store
        .set(&Key::<HealthV1>::new("health"), HealthV1 { hp })
        .unwrap();
    store.close().unwrap();
}

#[test]
fn chain_applies_every_step_in_order() {
    let test = TestStore::new();
    store_v1(&test, 40);

    let store = test.open();
    store
        .migrations()
        .register(Migrator::new::<Health, _>(2, 3, |h| h.regen = h.max_hp / 10).unwrap());
    store
        .migrations()
        .register(Migrator::new::<Health, _>(1, 2, |h| h.max_hp = h.hp * 2).unwrap());

    let health = store.get(&Key::<Health>::new("health")).unwrap();
    assert_eq!(
        health,
        Health {
            hp: 40,
            max_hp: 80,
            regen: 8
        }
    );
    assert!(store.is_dirty("health"));
    store.force_save().unwrap();
    drop(store);

    // Rewritten at version 3, so no migrators are needed any more
    let store = test.open();
    assert_eq!(store.get(&Key::<Health>::new("health")).unwrap().regen, 8);
    assert!(store.diagnostics().is_empty());
}

#[test]
fn gap_in_chain_falls_back_to_default() {
    let test = TestStore::new();
    store_v1(&test, 40);

    let store = test.open();
    store
        .migrations()
        .register(Migrator::new::<Health, _>(1, 2, |h| h.max_hp = h.hp * 2).unwrap());

    let health = store.get(&Key::<Health>::new("health")).unwrap();
    assert_eq!(health, Health::default());
    assert!(store.diagnostics().any(|d| matches!(
        d,
        Diagnostic::MigrationFailed { key, from: 1, to: 3, .. } if key == "health"
    )));
}

#[test]
fn last_registration_for_a_version_wins() {
    let test = TestStore::new();
    store_v1(&test, 10);

    let store = test.open();
    let migrations = store.migrations();
    migrations.register(Migrator::new::<Health, _>(1, 3, |h| h.max_hp = -1).unwrap());
    migrations.register(Migrator::new::<Health, _>(1, 3, |h| h.max_hp = h.hp + 5).unwrap());

    let health = store.get(&Key::<Health>::new("health")).unwrap();
    assert_eq!(health.max_hp, 15);
}

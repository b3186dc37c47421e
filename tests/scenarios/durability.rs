//! Crash safety and on-disk layout through the whole stack.

use crate::common::*;
use keystash::durability::testing::{CrashPoint, CrashingBackend};
use keystash::{
    CommitStrategy, DurableStore, Key, MigrationRegistry, Registry, SaveStore, SerializationMode,
};
use std::sync::Arc;

fn crashing_store(test: &TestStore, point: CrashPoint) -> SaveStore {
    SaveStore::open_with_backend(
        test.config(),
        Arc::new(Registry::new()),
        Arc::new(MigrationRegistry::new()),
        Arc::new(CrashingBackend::new(point)),
    )
    .unwrap()
}

#[test]
fn interrupted_flush_never_corrupts_previous_version() {
    for point in [
        CrashPoint::TornTempWrite,
        CrashPoint::BeforeCommit,
        CrashPoint::AfterBackup,
    ] {
        let test = TestStore::new();
        {
            let store = test.open();
            store.set(&player_key(), PlayerState { level: 1, gold: 10 }).unwrap();
        }

        let store = crashing_store(&test, point);
        store.update(&player_key(), |p| p.gold = 20).unwrap();
        assert!(store.force_save().is_err(), "{:?} did not fail", point);
        assert!(store.is_dirty("player_state"));
        // Drop retries the flush against the dead backend and only logs
        drop(store);

        let store = test.open();
        assert_eq!(
            store.get(&player_key()).unwrap().gold,
            10,
            "{:?} lost the committed version",
            point
        );
    }
}

#[test]
fn interrupted_first_write_leaves_no_entry() {
    let test = TestStore::new();
    let store = crashing_store(&test, CrashPoint::BeforeCommit);
    store.set(&player_key(), PlayerState { level: 5, gold: 5 }).unwrap();
    assert!(store.force_save().is_err());
    drop(store);

    let store = test.open();
    assert_eq!(store.stats().loaded_entries, 0);
    assert_eq!(store.get(&player_key()).unwrap(), PlayerState::default());
}

#[test]
fn files_are_named_by_key_hash() {
    let test = TestStore::new();
    let store = test.open();
    store.set(&Key::<u8>::new("weird/key: name?"), 1).unwrap();
    store.force_save().unwrap();

    let expected = test
        .data_dir()
        .join(DurableStore::file_name("weird/key: name?", "ksv"));
    assert_eq!(test.entry_files(), vec![expected]);
}

#[test]
fn delete_then_rename_round_trips() {
    let test = TestStore::new();
    let config = test.config().with_store(
        test.config()
            .store
            .with_commit(CommitStrategy::DeleteThenRename),
    );
    for gold in [1, 2, 3] {
        let store = SaveStore::open(config.clone()).unwrap();
        store.update(&player_key(), |p| p.gold = gold).unwrap();
    }
    let store = SaveStore::open(config).unwrap();
    assert_eq!(store.get(&player_key()).unwrap().gold, 3);
    assert_eq!(test.entry_files().len(), 1);
}

#[test]
fn compact_mode_store_round_trips_and_is_smaller() {
    let tagged = TestStore::new();
    let compact = TestStore::new();
    let value = PlayerState { level: 4, gold: 4000 };

    {
        let store = tagged.open();
        store.set(&player_key(), value.clone()).unwrap();
    }
    {
        let store = SaveStore::open(compact.config().with_mode(SerializationMode::Compact)).unwrap();
        store.set(&player_key(), value.clone()).unwrap();
    }

    let size = |test: &TestStore| {
        let files = test.entry_files();
        std::fs::metadata(&files[0]).unwrap().len()
    };
    assert!(size(&compact) < size(&tagged));

    let store = SaveStore::open(compact.config().with_mode(SerializationMode::Compact)).unwrap();
    assert_eq!(store.get(&player_key()).unwrap(), value);
}

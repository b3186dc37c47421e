//! The basic store contract: defaults, mutation, flush, reopen.

use crate::common::*;
use keystash::Key;

#[test]
fn update_then_reopen_returns_saved_value() {
    let test = TestStore::new();
    let key = player_key();

    {
        let store = test.open();
        assert_eq!(store.get(&key).unwrap(), PlayerState { level: 1, gold: 0 });
        store.update(&key, |p| p.gold = 100).unwrap();
        assert_eq!(store.force_save().unwrap(), 1);
    }

    let store = test.open();
    assert_eq!(
        store.get(&key).unwrap(),
        PlayerState {
            level: 1,
            gold: 100
        }
    );
    assert!(!store.is_dirty("player_state"));
}

#[test]
fn second_force_save_writes_nothing() {
    let test = TestStore::new();
    let store = test.open();
    store.set(&player_key(), PlayerState { level: 2, gold: 5 }).unwrap();
    store.set(&Key::<String>::new("name"), "ada".to_string()).unwrap();

    assert_eq!(store.force_save().unwrap(), 2);
    let before = snapshot_mtimes(&test.data_dir());
    assert_eq!(before.len(), 2);

    assert_eq!(store.force_save().unwrap(), 0);
    assert_eq!(snapshot_mtimes(&test.data_dir()), before);
    assert_eq!(store.stats().files_written, 2);
}

#[test]
fn default_is_persisted_on_first_flush() {
    let test = TestStore::new();
    {
        let store = test.open();
        store.register(&player_key()).unwrap();
        assert!(store.is_dirty("player_state"));
        store.force_save().unwrap();
    }
    assert_eq!(test.entry_files().len(), 1);

    let store = test.open();
    assert_eq!(store.stats().loaded_entries, 1);
    store.register(&player_key()).unwrap();
    assert!(!store.is_dirty("player_state"));
}

#[test]
fn edit_guard_persists_on_scope_exit() {
    let test = TestStore::new();
    {
        let store = test.open();
        let key = player_key();
        store.register(&key).unwrap();
        store.force_save().unwrap();

        {
            let mut player = store.edit(&key).unwrap();
            player.level += 1;
            player.gold = 42;
        }
        assert_eq!(store.dirty_count(), 1);
        store.force_save().unwrap();
    }

    let store = test.open();
    assert_eq!(
        store.get(&player_key()).unwrap(),
        PlayerState { level: 2, gold: 42 }
    );
}

#[test]
fn delete_all_resets_like_a_first_run() {
    let test = TestStore::new();
    let store = test.open();
    let key = player_key();
    let coins: Key<u64> = Key::with_default("coins", || 10);

    store.set(&key, PlayerState { level: 9, gold: 9 }).unwrap();
    store.set(&coins, 500).unwrap();
    store.force_save().unwrap();
    assert_eq!(test.entry_files().len(), 2);

    store.delete_all().unwrap();
    assert!(test.entry_files().is_empty());
    assert_eq!(store.get(&key).unwrap(), PlayerState::default());
    assert_eq!(store.get(&coins).unwrap(), 10);
    assert_eq!(store.dirty_count(), 2);

    store.force_save().unwrap();
    drop(store);
    let store = test.open();
    assert_eq!(store.get(&coins).unwrap(), 10);
}

#[test]
fn collections_and_math_types_round_trip() {
    use std::collections::{BTreeMap, HashMap};

    let test = TestStore::new();
    let inventory: Key<BTreeMap<String, u32>> = Key::new("inventory");
    let path: Key<Vec<glam::Vec3>> = Key::new("path");
    let session: Key<Option<uuid::Uuid>> = Key::new("session");
    let flags: Key<HashMap<u16, bool>> = Key::new("flags");

    let items: BTreeMap<String, u32> = [("potion".to_string(), 3), ("key".to_string(), 1)]
        .into_iter()
        .collect();
    let points = vec![glam::Vec3::new(1.0, 2.0, 3.0), glam::Vec3::ZERO];
    let id = uuid::Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
    let toggles: HashMap<u16, bool> = [(1, true), (7, false)].into_iter().collect();

    {
        let store = test.open();
        store.set(&inventory, items.clone()).unwrap();
        store.set(&path, points.clone()).unwrap();
        store.set(&session, Some(id)).unwrap();
        store.set(&flags, toggles.clone()).unwrap();
        store.close().unwrap();
    }

    let store = test.open();
    assert_eq!(store.get(&inventory).unwrap(), items);
    assert_eq!(store.get(&path).unwrap(), points);
    assert_eq!(store.get(&session).unwrap(), Some(id));
    assert_eq!(store.get(&flags).unwrap(), toggles);
}

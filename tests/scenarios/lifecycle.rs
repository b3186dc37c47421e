//! Soft saves, background flushing, shutdown and configuration files.

use crate::common::*;
use keystash::{
    Error, Key, LifecycleHooks, SaveStore, SaveStoreConfig, CONFIG_FILE_NAME,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn soft_save_is_picked_up_by_background_task() {
    let test = TestStore::new();
    let config = test.config().with_flush_interval(Duration::from_millis(10));
    let store = SaveStore::open(config).unwrap();

    store.update(&player_key(), |p| p.level = 3).unwrap();
    store.save();

    let deadline = Instant::now() + Duration::from_secs(10);
    while store.is_dirty("player_state") && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!store.is_dirty("player_state"));
    assert_eq!(test.entry_files().len(), 1);
}

#[test]
fn hooks_drive_persistence_from_a_host_loop() {
    let test = TestStore::new();
    let store = Arc::new(test.open());
    let hooks: Vec<Box<dyn LifecycleHooks>> = vec![Box::new(Arc::clone(&store))];

    store.set(&Key::<u32>::new("frame"), 1).unwrap();
    for hook in &hooks {
        assert_eq!(hook.on_tick().unwrap(), 0);
    }
    store.save();
    for hook in &hooks {
        assert_eq!(hook.on_tick().unwrap(), 1);
    }

    store.set(&Key::<u32>::new("frame"), 2).unwrap();
    for hook in &hooks {
        assert_eq!(hook.on_shutdown().unwrap(), 1);
    }
}

#[test]
fn close_flushes_and_rejects_later_calls() {
    let test = TestStore::new();
    let store = test.open();
    store.set(&player_key(), PlayerState { level: 8, gold: 1 }).unwrap();

    store.close().unwrap();
    assert!(matches!(store.get(&player_key()), Err(Error::StoreClosed)));
    assert!(matches!(
        store.set(&player_key(), PlayerState::default()),
        Err(Error::StoreClosed)
    ));
    assert!(matches!(store.delete_all(), Err(Error::StoreClosed)));

    let reopened = test.open();
    assert_eq!(reopened.get(&player_key()).unwrap().level, 8);
}

#[test]
fn store_configured_from_toml_file() {
    let test = TestStore::new();
    let path = test.dir.path().join(CONFIG_FILE_NAME);
    SaveStoreConfig::write_default_if_missing(&path).unwrap();

    let mut config = SaveStoreConfig::from_file(&path).unwrap();
    assert_eq!(config, SaveStoreConfig::default());

    config.flush_interval_ms = 0;
    config.store.dir = test.data_dir();
    config.write_to_file(&path).unwrap();

    let store = SaveStore::open(SaveStoreConfig::from_file(&path).unwrap()).unwrap();
    assert!(store.config().flush_interval().is_none());
    assert_eq!(store.dir(), test.data_dir().as_path());
}

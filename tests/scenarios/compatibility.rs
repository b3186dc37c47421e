//! Stored data that no longer matches the code reading it.

use crate::common::*;
use keystash::{Diagnostic, ErasedCodec, FieldOptions, Key, Persist, Registry, Result, Schema};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
struct LegacyInventory {
    slots: Vec<String>,
}

impl Persist for LegacyInventory {
    fn type_name() -> String {
        "LegacyInventory".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<LegacyInventory>::builder(Self::type_name())
            .field("slots", |i| &i.slots, |i, v| i.slots = v)
            .into_codec(registry))
    }
}

#[test]
fn unresolvable_stored_type_falls_back_to_default() {
    let test = TestStore::new();
    {
        let store = test.open();
        store
            .set(
                &Key::<LegacyInventory>::new("player_state"),
                LegacyInventory {
                    slots: vec!["sword".to_string()],
                },
            )
            .unwrap();
    }

    let store = test.open();
    assert_eq!(store.get(&player_key()).unwrap(), PlayerState::default());
    assert!(store.diagnostics().any(|d| matches!(
        d,
        Diagnostic::UnresolvableStoredType { context, type_name }
            if context == "player_state" && type_name == "LegacyInventory"
    )));

    // The unreadable file is only replaced once the value changes
    assert!(!store.is_dirty("player_state"));
    store.update(&player_key(), |p| p.gold = 7).unwrap();
    store.force_save().unwrap();
    drop(store);

    let store = test.open();
    assert_eq!(store.get(&player_key()).unwrap().gold, 7);
    assert!(store.diagnostics().is_empty());
}

#[test]
fn one_bad_key_does_not_affect_others() {
    let test = TestStore::new();
    let coins: Key<u64> = Key::new("coins");
    {
        let store = test.open();
        store
            .set(&Key::<String>::new("player_state"), "not a player".to_string())
            .unwrap();
        store.set(&coins, 250).unwrap();
    }

    let store = test.open();
    assert_eq!(store.get(&coins).unwrap(), 250);
    assert_eq!(store.get(&player_key()).unwrap(), PlayerState::default());
    assert!(store.diagnostics().any(|d| matches!(
        d,
        Diagnostic::StoredTypeMismatch { stored, declared, .. }
            if stored == "String" && declared == "PlayerState"
    )));
}

#[test]
fn corrupt_file_is_skipped_at_open() {
    let test = TestStore::new();
    {
        let store = test.open();
        store.set(&player_key(), PlayerState { level: 3, gold: 30 }).unwrap();
    }
    std::fs::write(test.data_dir().join("garbage.ksv"), b"not an entry").unwrap();

    let store = test.open();
    assert_eq!(store.stats().loaded_entries, 1);
    assert_eq!(store.get(&player_key()).unwrap().level, 3);
    assert!(store
        .diagnostics()
        .any(|d| matches!(d, Diagnostic::SkippedFile { .. })));
}

#[test]
fn removed_member_is_reported_not_fatal() {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct PlayerStateV2 {
        level: i64,
        nickname: String,
    }

    impl Persist for PlayerStateV2 {
        fn type_name() -> String {
            "PlayerState".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<PlayerStateV2>::builder(Self::type_name())
                .field("level", |p| &p.level, |p, v| p.level = v)
                .field_with(
                    FieldOptions::new("nickname").id("name"),
                    |p| &p.nickname,
                    |p, v| p.nickname = v,
                )
                .into_codec(registry))
        }
    }

    let test = TestStore::new();
    {
        let store = test.open();
        store.set(&player_key(), PlayerState { level: 12, gold: 99 }).unwrap();
    }

    let store = test.open();
    let player = store.get(&Key::<PlayerStateV2>::new("player_state")).unwrap();
    // i32 level widened into i64, gold dropped, nickname defaulted
    assert_eq!(
        player,
        PlayerStateV2 {
            level: 12,
            nickname: String::new()
        }
    );
    assert!(store.diagnostics().any(|d| matches!(
        d,
        Diagnostic::UnknownFields { field_ids, .. } if field_ids == &vec!["gold".to_string()]
    )));
}

//! Schema evolution through the tagged and compact layouts
//!
//! Each test writes a value with one version of a type and reads it back with
//! another version that shares the same wire name, the way an application
//! update reads files written by the previous release.

use keystash_codec::{
    Diagnostic, ErasedCodec, FieldOptions, Persist, Registry, Result, Schema, SerializationMode,
};
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct PlayerV1 {
    name: String,
    level: i32,
    gold: i64,
}

impl Persist for PlayerV1 {
    fn type_name() -> String {
        "Player".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<PlayerV1>::builder("Player")
            .field("name", |p| &p.name, |p, v| p.name = v)
            .field("level", |p| &p.level, |p, v| p.level = v)
            .field("gold", |p| &p.gold, |p, v| p.gold = v)
            .into_codec(registry))
    }
}

/// `name` renamed with a pinned id, `level` widened to f64, `gold` removed,
/// `title` added
#[derive(Debug, Default, Clone, PartialEq)]
struct PlayerV2 {
    display_name: String,
    level: f64,
    title: String,
}

impl Persist for PlayerV2 {
    fn type_name() -> String {
        "Player".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<PlayerV2>::builder("Player")
            .field_with(
                FieldOptions::new("display_name").id("name"),
                |p| &p.display_name,
                |p, v| p.display_name = v,
            )
            .field("level", |p| &p.level, |p, v| p.level = v)
            .field("title", |p| &p.title, |p, v| p.title = v)
            .into_codec(registry))
    }
}

/// `level` narrowed to a type that cannot hold the stored value
#[derive(Debug, Default, Clone, PartialEq)]
struct PlayerNarrow {
    name: String,
    level: bool,
}

impl Persist for PlayerNarrow {
    fn type_name() -> String {
        "Player".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<PlayerNarrow>::builder("Player")
            .field("name", |p| &p.name, |p, v| p.name = v)
            .field("level", |p| &p.level, |p, v| p.level = v)
            .into_codec(registry))
    }
}

fn v1() -> PlayerV1 {
    PlayerV1 {
        name: "ada".to_string(),
        level: 7,
        gold: 1200,
    }
}

#[test]
fn test_tagged_tolerates_rename_retype_add_remove() {
    let writer = Registry::new();
    let bytes = writer.serialize(&v1()).unwrap();

    let reader = Registry::new();
    let v2: PlayerV2 = reader.deserialize(&bytes).unwrap();

    assert_eq!(v2.display_name, "ada");
    assert_eq!(v2.level, 7.0);
    assert_eq!(v2.title, "");

    let diagnostics = reader.diagnostics().snapshot();
    assert_eq!(
        diagnostics,
        vec![Diagnostic::UnknownFields {
            type_name: "Player".to_string(),
            field_ids: vec!["gold".to_string()],
        }]
    );
}

#[test]
fn test_failed_member_conversion_keeps_default() {
    let writer = Registry::new();
    let mut player = v1();
    player.level = 42;
    let bytes = writer.serialize(&player).unwrap();

    let reader = Registry::new();
    let narrow: PlayerNarrow = reader.deserialize(&bytes).unwrap();

    // i32 -> bool is a valid conversion, so this succeeds
    assert_eq!(narrow.name, "ada");
    assert!(narrow.level);

    #[derive(Debug, Default)]
    struct PlayerChar {
        level: char,
    }

    impl Persist for PlayerChar {
        fn type_name() -> String {
            "Player".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<PlayerChar>::builder("Player")
                .field("level", |p| &p.level, |p, v| p.level = v)
                .into_codec(registry))
        }
    }

    let mut player = v1();
    player.level = -5;
    let bytes = writer.serialize(&player).unwrap();
    let reader = Registry::new();
    let read: PlayerChar = reader.deserialize(&bytes).unwrap();
    assert_eq!(read.level, '\0');
    assert!(reader.diagnostics().any(|d| matches!(
        d,
        Diagnostic::FieldConversionFailed { field_id, .. } if field_id == "level"
    )));
}

#[test]
fn test_tagged_round_trip_is_lossless() {
    let registry = Registry::new();
    let bytes = registry.serialize(&v1()).unwrap();
    assert_eq!(&bytes[..4], b"KSTF");
    assert_eq!(registry.deserialize::<PlayerV1>(&bytes).unwrap(), v1());
    assert!(registry.diagnostics().is_empty());
}

#[test]
fn test_tagged_order_independent() {
    #[derive(Debug, Default, PartialEq)]
    struct Reordered {
        name: String,
        level: i32,
        gold: i64,
    }

    impl Persist for Reordered {
        fn type_name() -> String {
            "Player".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<Reordered>::builder("Player")
                .field_with(FieldOptions::new("gold").order(0), |p| &p.gold, |p, v| p.gold = v)
                .field_with(FieldOptions::new("level").order(1), |p| &p.level, |p, v| {
                    p.level = v
                })
                .field_with(FieldOptions::new("name").order(2), |p| &p.name, |p, v| {
                    p.name = v
                })
                .into_codec(registry))
        }
    }

    let bytes = Registry::new().serialize(&v1()).unwrap();
    let read: Reordered = Registry::new().deserialize(&bytes).unwrap();
    assert_eq!(
        read,
        Reordered {
            name: "ada".into(),
            level: 7,
            gold: 1200
        }
    );
}

#[derive(Debug, Default, PartialEq)]
struct CompactAb {
    a: i32,
    b: i32,
}

impl Persist for CompactAb {
    fn type_name() -> String {
        "Pair".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<CompactAb>::builder("Pair")
            .field("a", |p| &p.a, |p, v| p.a = v)
            .field("b", |p| &p.b, |p, v| p.b = v)
            .into_codec(registry))
    }
}

/// Same members, explicit order swapped
#[derive(Debug, Default, PartialEq)]
struct CompactBa {
    a: i32,
    b: i32,
}

impl Persist for CompactBa {
    fn type_name() -> String {
        "Pair".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<CompactBa>::builder("Pair")
            .field_with(FieldOptions::new("b").order(0), |p| &p.b, |p, v| p.b = v)
            .field_with(FieldOptions::new("a").order(1), |p| &p.a, |p, v| p.a = v)
            .into_codec(registry))
    }
}

#[test]
fn test_compact_round_trip() {
    let registry = Registry::new().with_mode(SerializationMode::Compact);
    let value = CompactAb { a: 1, b: 2 };
    let bytes = registry.serialize(&value).unwrap();
    assert_eq!(bytes.len(), 1 + 4 + 4);
    assert_eq!(registry.deserialize::<CompactAb>(&bytes).unwrap(), value);
}

#[test]
fn test_compact_is_order_sensitive() {
    let writer = Registry::new().with_mode(SerializationMode::Compact);
    let bytes = writer.serialize(&CompactAb { a: 1, b: 2 }).unwrap();

    let reader = Registry::new().with_mode(SerializationMode::Compact);
    let swapped: CompactBa = reader.deserialize(&bytes).unwrap();
    assert_eq!(swapped, CompactBa { a: 2, b: 1 });
}

#[test]
fn test_tagged_is_smaller_only_in_compact() {
    let tagged = Registry::new().serialize(&CompactAb { a: 1, b: 2 }).unwrap();
    let compact = Registry::new()
        .with_mode(SerializationMode::Compact)
        .serialize(&CompactAb { a: 1, b: 2 })
        .unwrap();
    assert!(compact.len() < tagged.len());
}

#[test]
fn test_duplicate_field_id_reported_once() {
    #[derive(Debug, Default)]
    struct Dup {
        a: i32,
        b: i32,
    }

    impl Persist for Dup {
        fn type_name() -> String {
            "Dup".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<Dup>::builder("Dup")
                .field_with(FieldOptions::new("a").id("x"), |p| &p.a, |p, v| p.a = v)
                .field_with(FieldOptions::new("b").id("x"), |p| &p.b, |p, v| p.b = v)
                .into_codec(registry))
        }
    }

    let registry = Registry::new();
    registry.serialize(&Dup::default()).unwrap();
    registry.serialize(&Dup::default()).unwrap();

    let duplicates: Vec<_> = registry
        .diagnostics()
        .snapshot()
        .into_iter()
        .filter(|d| matches!(d, Diagnostic::DuplicateFieldId { .. }))
        .collect();
    assert_eq!(duplicates.len(), 1);
}

#[test]
fn test_nested_composites_and_collections() {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Item {
        id: u32,
        count: u16,
    }

    impl Persist for Item {
        fn type_name() -> String {
            "Item".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<Item>::builder("Item")
                .field("id", |i| &i.id, |i, v| i.id = v)
                .field("count", |i| &i.count, |i, v| i.count = v)
                .into_codec(registry))
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Inventory {
        items: Vec<Item>,
        equipped: Option<Item>,
        slots: std::collections::BTreeMap<String, u32>,
    }

    impl Persist for Inventory {
        fn type_name() -> String {
            "Inventory".to_string()
        }

        fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
            Ok(Schema::<Inventory>::builder("Inventory")
                .field("items", |i| &i.items, |i, v| i.items = v)
                .field("equipped", |i| &i.equipped, |i, v| i.equipped = v)
                .field("slots", |i| &i.slots, |i, v| i.slots = v)
                .into_codec(registry))
        }
    }

    let mut inventory = Inventory {
        items: vec![Item { id: 1, count: 3 }, Item { id: 9, count: 1 }],
        equipped: Some(Item { id: 9, count: 1 }),
        slots: Default::default(),
    };
    inventory.slots.insert("head".into(), 9);

    let registry = Registry::new();
    let bytes = registry.serialize(&inventory).unwrap();
    assert_eq!(registry.deserialize::<Inventory>(&bytes).unwrap(), inventory);
}

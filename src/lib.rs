//! keystash - typed, versioned key-value persistence
//!
//! Values are addressed by typed keys, kept in memory, and flushed to one
//! binary file per key. Schemas can change between releases: the tagged
//! structural format tolerates added, removed, renamed and retyped members,
//! and registered migrations upgrade older data versions on load.
//!
//! # Quick Start
//!
//! ```no_run
//! use keystash::{Key, Persist, Registry, SaveStore, SaveStoreConfig, Schema};
//! use keystash::{ErasedCodec, Result};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct PlayerState {
//!     level: i32,
//!     gold: i64,
//! }
//!
//! impl Persist for PlayerState {
//!     fn type_name() -> String {
//!         "PlayerState".to_string()
//!     }
//!
//!     fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
//!         Ok(Schema::<PlayerState>::builder(Self::type_name())
//!             .field("level", |p| &p.level, |p, v| p.level = v)
//!             .field("gold", |p| &p.gold, |p, v| p.gold = v)
//!             .into_codec(registry))
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let store = SaveStore::open(SaveStoreConfig::new("saves"))?;
//! let player = Key::with_default("player_state", || PlayerState { level: 1, gold: 0 });
//!
//! store.update(&player, |p| p.gold = 100)?;
//! store.force_save()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `keystash-core`: errors, diagnostics, wire primitives, `DynValue`
//! - `keystash-codec`: codecs, registry, structural formats, migrations
//! - `keystash-durability`: entry envelope and atomic per-key files
//! - `keystash-engine`: the save store that ties them together

pub use keystash_codec::*;
pub use keystash_core::{type_fingerprint, DEFAULT_DIAGNOSTICS_CAPACITY};
pub use keystash_durability::{
    CommitStrategy, DurableStore, EntryPayload, LocalFs, StorageBackend, StoreConfig,
};
pub use keystash_engine::*;

/// Lower-level building blocks
pub mod durability {
    pub use keystash_durability::*;
}

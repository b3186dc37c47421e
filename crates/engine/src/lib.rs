//! Save store engine for keystash
//!
//! This crate orchestrates the lower layers:
//! - Key: typed identity of a stored slot with its default value
//! - SaveStore: in-memory records, dirty tracking, batched flushes
//! - EditGuard: scoped mutable access that always persists on release
//! - Background flush task and lifecycle hooks
//! - SaveStoreConfig: `keystash.toml` configuration
//!
//! The engine is the only component that knows about:
//! - Registration of keys against entries loaded from disk
//! - Migration of stored values to the current schema version
//! - When to hand a batch of records to the durable store

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod config;
pub mod key;
pub mod lifecycle;
mod record;
pub mod store;

pub use background::FLUSH_THREAD_NAME;
pub use config::{SaveStoreConfig, CONFIG_FILE_NAME, DEFAULT_FLUSH_INTERVAL_MS};
pub use key::Key;
pub use lifecycle::LifecycleHooks;
pub use store::{EditGuard, SaveStore, StoreStats};

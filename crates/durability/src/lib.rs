//! Durability layer for keystash
//!
//! This crate handles everything that touches disk:
//!
//! - Entry envelope: the binary per-key file format
//! - StorageBackend: the file operations the store relies on (`LocalFs`)
//! - DurableStore: one file per key, atomic replace, load with recovery of
//!   interrupted writes
//! - StoreConfig: directory, extension, commit strategy, fsync policy
//! - Crash testing infrastructure

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod file_store;
pub mod format;
pub mod testing;

pub use backend::{LocalFs, StorageBackend};
pub use config::{
    CommitStrategy, ConfigError, StoreConfig, BACKUP_EXTENSION, DEFAULT_EXTENSION,
    TEMP_EXTENSION,
};
pub use file_store::DurableStore;
pub use format::{EntryPayload, ENTRY_FORMAT_VERSION, ENTRY_MAGIC};

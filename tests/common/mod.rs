//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use keystash::{
    ErasedCodec, Key, Persist, Registry, Result, SaveStore, SaveStoreConfig, Schema, StoreConfig,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once; filter with `RUST_LOG`
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// Player state used by most scenarios
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub level: i32,
    pub gold: i64,
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState { level: 1, gold: 0 }
    }
}

impl Persist for PlayerState {
    fn type_name() -> String {
        "PlayerState".to_string()
    }

    fn build_codec(registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
        Ok(Schema::<PlayerState>::builder(Self::type_name())
            .field("level", |p| &p.level, |p, v| p.level = v)
            .field("gold", |p| &p.gold, |p, v| p.gold = v)
            .into_codec(registry))
    }
}

/// The `player_state` key with default `{level: 1, gold: 0}`
pub fn player_key() -> Key<PlayerState> {
    Key::new("player_state")
}

/// Temp directory plus the config of a store living inside it
///
/// Background flushing and fsync are off so tests control every write.
pub struct TestStore {
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        init_tracing();
        TestStore {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("saves")
    }

    pub fn config(&self) -> SaveStoreConfig {
        SaveStoreConfig::default()
            .without_background_flush()
            .with_store(StoreConfig::new(self.data_dir()).with_sync_on_write(false))
    }

    /// Open a fresh store instance against the same directory
    pub fn open(&self) -> SaveStore {
        SaveStore::open(self.config()).expect("open store")
    }

    /// Entry files currently on disk
    pub fn entry_files(&self) -> Vec<PathBuf> {
        list_files(&self.data_dir())
    }
}

/// Sorted files in a directory; empty if it does not exist
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.expect("dir entry").path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Modification times of all entry files, for "nothing was rewritten" checks
pub fn snapshot_mtimes(dir: &Path) -> Vec<(PathBuf, std::time::SystemTime)> {
    list_files(dir)
        .into_iter()
        .map(|p| {
            let modified = std::fs::metadata(&p)
                .and_then(|m| m.modified())
                .expect("file mtime");
            (p, modified)
        })
        .collect()
}

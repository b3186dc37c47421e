//! Save store configuration via `keystash.toml`
//!
//! Every setting has a default, so an empty file (or no file at all) is a
//! valid configuration. `write_default_if_missing` drops a commented template
//! next to the data so it can be edited and picked up on the next open.

use keystash_codec::SerializationMode;
use keystash_core::{Error, Result, DEFAULT_DIAGNOSTICS_CAPACITY};
use keystash_durability::StoreConfig;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;

/// Config file name placed next to the store directory
pub const CONFIG_FILE_NAME: &str = "keystash.toml";

/// Default background flush interval
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Save store configuration loaded from `keystash.toml`
///
/// # Example
///
/// ```toml
/// flush_interval_ms = 500
/// mode = "compact"
///
/// [store]
/// dir = "saves"
/// commit = "atomic_replace"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveStoreConfig {
    /// Background flush interval in milliseconds; 0 disables the task
    pub flush_interval_ms: u64,
    /// Default structural layout for schemas that do not pick one
    pub mode: SerializationMode,
    /// Maximum number of retained diagnostics
    pub diagnostics_capacity: usize,
    /// Durable store settings
    pub store: StoreConfig,
}

impl Default for SaveStoreConfig {
    fn default() -> Self {
        SaveStoreConfig {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            mode: SerializationMode::default(),
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
            store: StoreConfig::default(),
        }
    }
}

impl SaveStoreConfig {
    /// Default settings storing files in `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        SaveStoreConfig {
            store: StoreConfig::new(dir),
            ..Default::default()
        }
    }

    /// Set the flush interval; zero disables background flushing
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Disable background flushing
    pub fn without_background_flush(mut self) -> Self {
        self.flush_interval_ms = 0;
        self
    }

    /// Set the default structural layout
    pub fn with_mode(mut self, mode: SerializationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the diagnostics capacity
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Replace the durable store settings
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Background flush interval, `None` when disabled
    pub fn flush_interval(&self) -> Option<Duration> {
        match self.flush_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.diagnostics_capacity == 0 {
            return Err(Error::InvalidConfig(
                "diagnostics_capacity must be at least 1".to_string(),
            ));
        }
        self.store.validate()?;
        Ok(())
    }

    /// The default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# keystash save store configuration

# Background flush interval in milliseconds (default: 1000).
# The flush only runs when something called `save()` since the last one.
# 0 disables the background task; call `force_save()` yourself.
flush_interval_ms = 1000

# Default structural layout: "tagged" (default) or "compact"
#   "tagged"  = self-describing, tolerates added, removed and renamed fields
#   "compact" = positional, smaller, breaks if members are reordered
mode = "tagged"

# Number of warnings kept for inspection (default: 1024)
diagnostics_capacity = 1024

[store]
# Directory holding one file per key
dir = "keystash-data"

# Entry file extension, without the dot
extension = "ksv"

# "atomic_replace" (default) keeps the previous version recoverable if the
# process dies mid-write; "delete_then_rename" does not
commit = "atomic_replace"

# Fsync each file and the directory after writing (default: true)
sync_on_write = true
"#
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SaveStoreConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: SaveStoreConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Io(io::Error::new(
                    e.kind(),
                    format!(
                        "failed to write default config file '{}': {}",
                        path.display(),
                        e
                    ),
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("failed to write config file '{}': {}", path.display(), e),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_durability::CommitStrategy;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = SaveStoreConfig::default();
        assert_eq!(config.flush_interval(), Some(Duration::from_secs(1)));
        assert_eq!(config.mode, SerializationMode::Tagged);
        assert_eq!(config.diagnostics_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_toml_matches_default() {
        let config = SaveStoreConfig::from_toml_str(SaveStoreConfig::default_toml()).unwrap();
        assert_eq!(config, SaveStoreConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = SaveStoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, SaveStoreConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let config = SaveStoreConfig::from_toml_str(
            r#"
flush_interval_ms = 0
mode = "compact"

[store]
dir = "saves"
commit = "delete_then_rename"
"#,
        )
        .unwrap();
        assert_eq!(config.flush_interval(), None);
        assert_eq!(config.mode, SerializationMode::Compact);
        assert_eq!(config.store.dir, PathBuf::from("saves"));
        assert_eq!(config.store.commit, CommitStrategy::DeleteThenRename);
        assert_eq!(config.store.extension, "ksv");
        assert!(config.store.sync_on_write);
    }

    #[test]
    fn parse_invalid_mode_returns_error() {
        let err = SaveStoreConfig::from_toml_str("mode = \"turbo\"").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn invalid_store_settings_are_rejected() {
        let err = SaveStoreConfig::from_toml_str("[store]\nextension = \"tmp\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let config = SaveStoreConfig::default().with_diagnostics_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builders() {
        let config = SaveStoreConfig::new("saves")
            .with_flush_interval(Duration::from_millis(250))
            .with_mode(SerializationMode::Compact);
        assert_eq!(config.flush_interval_ms, 250);
        assert_eq!(config.store.dir, PathBuf::from("saves"));
        assert_eq!(config.without_background_flush().flush_interval(), None);
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        SaveStoreConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(
            SaveStoreConfig::from_file(&path).unwrap(),
            SaveStoreConfig::default()
        );
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "flush_interval_ms = 42\n").unwrap();

        SaveStoreConfig::write_default_if_missing(&path).unwrap();

        let config = SaveStoreConfig::from_file(&path).unwrap();
        assert_eq!(config.flush_interval_ms, 42);
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = SaveStoreConfig::new(dir.path().join("data"))
            .with_mode(SerializationMode::Compact)
            .with_store(
                StoreConfig::new(dir.path().join("data"))
                    .with_extension("sav")
                    .with_sync_on_write(false),
            );
        config.write_to_file(&path).unwrap();

        assert_eq!(SaveStoreConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = SaveStoreConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

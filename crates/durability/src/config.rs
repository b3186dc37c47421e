//! Durable store configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file extension for entry files
pub const DEFAULT_EXTENSION: &str = "ksv";

/// Extension of in-flight temporary files
pub const TEMP_EXTENSION: &str = "tmp";

/// Extension of transient backups made during an atomic replace
pub const BACKUP_EXTENSION: &str = "bak";

/// How a fully written temporary file replaces the entry file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStrategy {
    /// Move the current file to a backup, move the temp file in, drop the
    /// backup. The previous version survives a crash at any step.
    #[default]
    AtomicReplace,
    /// Delete the current file, then move the temp file in. A crash between
    /// the two steps loses the entry.
    DeleteThenRename,
}

/// Durable store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one file per key
    pub dir: PathBuf,
    /// Entry file extension, without the dot
    pub extension: String,
    /// Commit strategy
    pub commit: CommitStrategy,
    /// Fsync temp files and the directory after each commit
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            dir: PathBuf::from("keystash-data"),
            extension: DEFAULT_EXTENSION.to_string(),
            commit: CommitStrategy::default(),
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    /// Default settings rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        StoreConfig {
            dir: dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the entry file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Set the commit strategy
    pub fn with_commit(mut self, commit: CommitStrategy) -> Self {
        self.commit = commit;
        self
    }

    /// Enable or disable fsync
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDirectory);
        }
        let ext = self.extension.as_str();
        if ext.is_empty() {
            return Err(ConfigError::InvalidExtension(
                ext.to_string(),
                "must not be empty",
            ));
        }
        if ext.contains(|c: char| matches!(c, '.' | '/' | '\\')) {
            return Err(ConfigError::InvalidExtension(
                ext.to_string(),
                "must not contain dots or path separators",
            ));
        }
        if ext == TEMP_EXTENSION || ext == BACKUP_EXTENSION {
            return Err(ConfigError::InvalidExtension(
                ext.to_string(),
                "is reserved for temporary files",
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Storage directory is empty
    #[error("storage directory must not be empty")]
    EmptyDirectory,

    /// File extension is unusable
    #[error("invalid file extension '{0}': {1}")]
    InvalidExtension(String, &'static str),
}

impl From<ConfigError> for keystash_core::Error {
    fn from(e: ConfigError) -> Self {
        keystash_core::Error::InvalidConfig(e.to_string())
    }
}

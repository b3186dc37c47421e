//! One-file-per-key durable store
//!
//! Each key lives in `<dir>/<hex(sha256(key))>.<ext>`. Hashing keeps arbitrary
//! key ids out of file names and needs no index file.
//!
//! # Write path
//!
//! 1. Encode the envelope and write it to `<file>.tmp` (fsync if configured)
//! 2. Commit according to [`CommitStrategy`]:
//!    - `AtomicReplace`: `<file>` -> `<file>.bak`, `<file>.tmp` -> `<file>`,
//!      delete `<file>.bak`
//!    - `DeleteThenRename`: delete `<file>`, `<file>.tmp` -> `<file>`
//! 3. Fsync the directory if configured
//!
//! # Load path
//!
//! Leftovers of an interrupted write are cleaned up first: a `.bak` whose
//! entry file is missing is moved back into place, any other `.bak` and every
//! `.tmp` is deleted. Then every entry file is read; files that fail to read
//! or decode are skipped with a [`Diagnostic::SkippedFile`].

use crate::backend::{LocalFs, StorageBackend};
use crate::config::{CommitStrategy, StoreConfig, BACKUP_EXTENSION, TEMP_EXTENSION};
use crate::format::EntryPayload;
use keystash_core::{Diagnostic, Diagnostics, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable store over a [`StorageBackend`]
pub struct DurableStore {
    config: StoreConfig,
    backend: Arc<dyn StorageBackend>,
    diagnostics: Arc<Diagnostics>,
}

impl DurableStore {
    /// Store on the local filesystem
    pub fn new(config: StoreConfig, diagnostics: Arc<Diagnostics>) -> Result<Self> {
        Self::with_backend(config, Arc::new(LocalFs), diagnostics)
    }

    /// Store on a custom backend
    pub fn with_backend(
        config: StoreConfig,
        backend: Arc<dyn StorageBackend>,
        diagnostics: Arc<Diagnostics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(DurableStore {
            config,
            backend,
            diagnostics,
        })
    }

    /// Configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// File name for a key id: lowercase hex SHA-256 plus extension
    pub fn file_name(key: &str, extension: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{}.{}", hex::encode(digest), extension)
    }

    /// Full path of the entry file for a key id
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.config
            .dir
            .join(Self::file_name(key, &self.config.extension))
    }

    /// Read every entry in the storage directory
    ///
    /// A missing directory is an empty store. Only a failure to list the
    /// directory is an error; unreadable files are skipped.
    pub fn load_all(&self) -> Result<HashMap<String, EntryPayload>> {
        let dir = self.dir();
        let mut entries = HashMap::new();
        if !self.backend.exists(dir) {
            return Ok(entries);
        }

        self.recover_interrupted_writes()?;

        for path in self.backend.list_files(dir, &self.config.extension)? {
            let entry = match self
                .backend
                .read(&path)
                .map_err(keystash_core::Error::from)
                .and_then(|bytes| EntryPayload::from_bytes(&bytes))
            {
                Ok(entry) => entry,
                Err(e) => {
                    self.skip(&path, e.to_string());
                    continue;
                }
            };

            if !entry.fingerprint_matches() {
                debug!(
                    target: "keystash::durability",
                    key = %entry.key,
                    type_name = %entry.type_name,
                    type_id = entry.type_id,
                    "Type fingerprint does not match stored type name"
                );
            }
            if let Some(previous) = entries.insert(entry.key.clone(), entry) {
                warn!(
                    target: "keystash::durability",
                    key = %previous.key,
                    path = %path.display(),
                    "Key stored in more than one file, keeping the later one"
                );
            }
        }

        info!(
            target: "keystash::durability",
            dir = %dir.display(),
            entries = entries.len(),
            "Loaded entries"
        );
        Ok(entries)
    }

    /// Write entries, stopping at the first failure
    ///
    /// Returns the number of entries written. Entries before a failure stay
    /// committed.
    pub fn save(&self, entries: &[EntryPayload]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.backend.create_dir_all(self.dir())?;
        for entry in entries {
            self.write_entry(entry)?;
        }
        if self.config.sync_on_write {
            self.backend.sync_dir(self.dir())?;
        }
        debug!(
            target: "keystash::durability",
            count = entries.len(),
            "Saved entries"
        );
        Ok(entries.len())
    }

    /// Write one entry
    pub fn save_entry(&self, entry: &EntryPayload) -> Result<()> {
        self.save(std::slice::from_ref(entry)).map(|_| ())
    }

    /// Delete the storage directory and everything in it
    pub fn delete_all(&self) -> Result<()> {
        self.backend.remove_dir_all(self.dir())?;
        info!(
            target: "keystash::durability",
            dir = %self.dir().display(),
            "Deleted storage directory"
        );
        Ok(())
    }

    fn write_entry(&self, entry: &EntryPayload) -> Result<()> {
        let target = self.path_for(&entry.key);
        let temp = with_suffix(&target, TEMP_EXTENSION);
        let bytes = entry.to_bytes()?;

        self.backend
            .write_temp(&temp, &bytes, self.config.sync_on_write)?;

        match self.config.commit {
            CommitStrategy::AtomicReplace => {
                if self.backend.exists(&target) {
                    let backup = with_suffix(&target, BACKUP_EXTENSION);
                    self.backend.rename(&target, &backup)?;
                    self.backend.rename(&temp, &target)?;
                    self.backend.remove_file(&backup)?;
                } else {
                    self.backend.rename(&temp, &target)?;
                }
            }
            CommitStrategy::DeleteThenRename => {
                if self.backend.exists(&target) {
                    self.backend.remove_file(&target)?;
                }
                self.backend.rename(&temp, &target)?;
            }
        }
        Ok(())
    }

    /// Clean up leftovers of interrupted writes
    ///
    /// Only listing the directory can fail; a leftover that cannot be
    /// restored or removed is reported and left in place.
    fn recover_interrupted_writes(&self) -> Result<()> {
        let dir = self.dir();
        for backup in self.backend.list_files(dir, BACKUP_EXTENSION)? {
            let target = backup.with_extension("");
            if target.extension().and_then(|e| e.to_str()) != Some(self.config.extension.as_str())
            {
                continue;
            }
            let result = if self.backend.exists(&target) {
                self.backend.remove_file(&backup)
            } else {
                warn!(
                    target: "keystash::durability",
                    path = %target.display(),
                    "Restoring entry from backup after interrupted write"
                );
                self.backend.rename(&backup, &target)
            };
            if let Err(e) = result {
                self.skip(&backup, format!("could not recover backup: {}", e));
            }
        }
        for temp in self.backend.list_files(dir, TEMP_EXTENSION)? {
            let target = temp.with_extension("");
            if target.extension().and_then(|e| e.to_str()) != Some(self.config.extension.as_str())
            {
                continue;
            }
            debug!(
                target: "keystash::durability",
                path = %temp.display(),
                "Removing stale temp file"
            );
            if let Err(e) = self.backend.remove_file(&temp) {
                self.skip(&temp, format!("could not remove temp file: {}", e));
            }
        }
        Ok(())
    }

    fn skip(&self, path: &Path, reason: String) {
        warn!(
            target: "keystash::durability",
            path = %path.display(),
            reason = %reason,
            "Skipping file"
        );
        self.diagnostics.report(Diagnostic::SkippedFile {
            path: path.to_path_buf(),
            reason,
        });
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("config", &self.config)
            .finish()
    }
}

/// `path` with `.suffix` appended to its full file name
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

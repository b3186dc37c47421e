//! Save store
//!
//! The orchestrator tying keys, codecs and disk together. Values live in
//! memory as records; mutations mark a record dirty; a flush serializes all
//! dirty records and hands them to the durable store as one batch.
//!
//! # Record lifecycle
//!
//! ```text
//! unloaded --register--> clean --set/update/edit--> dirty --flush ok--> clean
//!                                                     ^                   |
//!                                                     +---- flush err ----+ (stays dirty)
//! ```
//!
//! A key registered for the first time with nothing on disk starts dirty, so
//! its default gets written by the first flush.
//!
//! # Locking
//!
//! One mutex guards all records. Every operation, including the file I/O of
//! a flush, runs under it, so operations on one store are serialized. Codec
//! resolution happens before the lock is taken. Separate stores never share
//! state.
//!
//! # Soft vs forced saves
//!
//! [`SaveStore::save`] only raises a "needs flush" flag. The background task
//! (or a lifecycle hook) checks the flag periodically and calls
//! [`SaveStore::force_save`] when it is set.

use crate::background::FlushTask;
use crate::config::SaveStoreConfig;
use crate::key::Key;
use crate::record::{materialize, KnownKey, Record};
use keystash_codec::{MigrationRegistry, Persist, Registry};
use keystash_core::{Diagnostic, Diagnostics, Error, Result};
use keystash_durability::{DurableStore, EntryPayload, LocalFs, StorageBackend};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters describing what a store has done since it was opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries found on disk at open
    pub loaded_entries: usize,
    /// Successful flushes that wrote at least one record
    pub flushes: u64,
    /// Flushes that failed
    pub failed_flushes: u64,
    /// Entry files written
    pub files_written: u64,
    /// Message of the most recent failed flush, cleared by the next success
    pub last_error: Option<String>,
}

struct StoreState {
    records: BTreeMap<String, Record>,
    /// Entries loaded at open that no key has claimed yet
    pending: HashMap<String, EntryPayload>,
    known: BTreeMap<String, KnownKey>,
    stats: StoreStats,
}

struct StoreInner {
    state: Mutex<StoreState>,
    registry: Arc<Registry>,
    migrations: Arc<MigrationRegistry>,
    durable: DurableStore,
    config: SaveStoreConfig,
    needs_flush: AtomicBool,
    closed: AtomicBool,
}

/// Typed, versioned key-value store persisted one file per key
///
/// # Example
///
/// ```no_run
/// use keystash_engine::{Key, SaveStore, SaveStoreConfig};
///
/// # fn main() -> keystash_core::Result<()> {
/// let store = SaveStore::open(SaveStoreConfig::new("saves"))?;
/// let coins: Key<u64> = Key::new("coins");
///
/// store.update(&coins, |c| *c += 10)?;
/// store.save();
/// # Ok(())
/// # }
/// ```
pub struct SaveStore {
    inner: Arc<StoreInner>,
    flusher: Mutex<Option<FlushTask>>,
}

impl SaveStore {
    /// Open a store with a fresh registry and no migrations
    ///
    /// The registry uses the configured serialization mode and reports into a
    /// diagnostics sink of the configured capacity.
    pub fn open(config: SaveStoreConfig) -> Result<Self> {
        config.validate()?;
        let diagnostics = Arc::new(Diagnostics::new(config.diagnostics_capacity));
        let registry = Registry::with_diagnostics(diagnostics).with_mode(config.mode);
        Self::open_with(
            config,
            Arc::new(registry),
            Arc::new(MigrationRegistry::new()),
        )
    }

    /// Open a store sharing an existing registry and migration registry
    ///
    /// The registry's own mode and diagnostics sink are used; the matching
    /// config fields are ignored.
    pub fn open_with(
        config: SaveStoreConfig,
        registry: Arc<Registry>,
        migrations: Arc<MigrationRegistry>,
    ) -> Result<Self> {
        Self::open_with_backend(config, registry, migrations, Arc::new(LocalFs))
    }

    /// Open a store on a custom storage backend
    pub fn open_with_backend(
        config: SaveStoreConfig,
        registry: Arc<Registry>,
        migrations: Arc<MigrationRegistry>,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let durable = DurableStore::with_backend(
            config.store.clone(),
            backend,
            Arc::clone(registry.diagnostics()),
        )?;
        let pending = durable.load_all()?;

        info!(
            target: "keystash::store",
            dir = %durable.dir().display(),
            entries = pending.len(),
            "Opened save store"
        );

        let state = StoreState {
            records: BTreeMap::new(),
            stats: StoreStats {
                loaded_entries: pending.len(),
                ..Default::default()
            },
            pending,
            known: BTreeMap::new(),
        };
        let inner = Arc::new(StoreInner {
            state: Mutex::new(state),
            registry,
            migrations,
            durable,
            config,
            needs_flush: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let flusher = match inner.config.flush_interval() {
            Some(interval) => {
                let task_inner = Arc::clone(&inner);
                Some(FlushTask::spawn(interval, move || {
                    if let Err(e) = task_inner.flush_if_needed() {
                        warn!(target: "keystash::store", error = %e, "Background flush failed");
                    }
                })?)
            }
            None => None,
        };

        Ok(SaveStore {
            inner,
            flusher: Mutex::new(flusher),
        })
    }

    // ========================================================================
    // Registration and access
    // ========================================================================

    /// Register a key, loading its stored value if there is one
    ///
    /// Registering the same key again is a no-op. Registering an id already
    /// used with another value type fails with `KeyTypeMismatch`. A stored
    /// value that cannot be used (unknown or different type, undecodable,
    /// missing migration) is replaced by the key's default and reported to
    /// the diagnostics sink.
    pub fn register<T: Persist>(&self, key: &Key<T>) -> Result<()> {
        self.lock_record(key).map(|_| ())
    }

    /// Clone of the current value
    pub fn get<T: Persist + Clone>(&self, key: &Key<T>) -> Result<T> {
        let record = self.lock_record(key)?;
        record.get::<T>().cloned()
    }

    /// Run `f` on a borrowed value
    pub fn with<T: Persist, R>(&self, key: &Key<T>, f: impl FnOnce(&T) -> R) -> Result<R> {
        let record = self.lock_record(key)?;
        Ok(f(record.get::<T>()?))
    }

    /// Replace the value and mark it dirty
    pub fn set<T: Persist>(&self, key: &Key<T>, value: T) -> Result<()> {
        let mut record = self.lock_record(key)?;
        *record.get_mut::<T>()? = value;
        record.dirty = true;
        Ok(())
    }

    /// Mutate the value in place and mark it dirty
    pub fn update<T: Persist, R>(&self, key: &Key<T>, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut record = self.lock_record(key)?;
        let result = f(record.get_mut::<T>()?);
        record.dirty = true;
        Ok(result)
    }

    /// Scoped mutable access to the value
    ///
    /// The record counts as dirty once the guard is released, whether or not
    /// anything was changed. The store lock is held for the guard's lifetime:
    /// calling any other method of this store on the same thread before the
    /// guard is dropped deadlocks.
    pub fn edit<T: Persist>(&self, key: &Key<T>) -> Result<EditGuard<'_, T>> {
        let mut record = self.lock_record(key)?;
        record.get_mut::<T>()?;
        // Flushes need the lock, so nothing can see the flag before release
        record.dirty = true;
        let value = MappedMutexGuard::try_map(record, |r| r.value.downcast_mut::<T>()).map_err(
            |_| Error::ValueTypeMismatch {
                expected: T::type_name(),
            },
        )?;
        Ok(EditGuard { value })
    }

    fn lock_record<T: Persist>(&self, key: &Key<T>) -> Result<MappedMutexGuard<'_, Record>> {
        self.inner.ensure_open()?;
        let id = key.id();
        let codec = self.inner.registry.resolve::<T>()?;

        let mut state = self.inner.state.lock();
        let existing = state.known.get(id).map(|known| known.check_type::<T>(id));
        match existing {
            Some(checked) => checked?,
            None => {
                let known = KnownKey::new(key, codec);
                let record = match state.pending.remove(id) {
                    Some(entry) => materialize(
                        &self.inner.registry,
                        &self.inner.migrations,
                        &known,
                        entry,
                    ),
                    None => known.default_record(id, true),
                };
                debug!(
                    target: "keystash::store",
                    key = id,
                    type_name = known.type_name(),
                    dirty = record.dirty,
                    "Registered key"
                );
                state.records.insert(id.to_string(), record);
                state.known.insert(id.to_string(), known);
            }
        }

        MutexGuard::try_map(state, |s| s.records.get_mut(id))
            .map_err(|_| Error::Corruption(format!("record for key '{}' is missing", id)))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Request a flush at the next background tick
    pub fn save(&self) {
        self.inner.needs_flush.store(true, Ordering::Release);
    }

    /// Write every dirty record now
    ///
    /// Returns the number of entries written. On failure every record of the
    /// batch stays dirty and is retried by the next flush.
    pub fn force_save(&self) -> Result<usize> {
        self.inner.ensure_open()?;
        self.inner.flush()
    }

    /// Flush only if [`SaveStore::save`] was called since the last flush
    pub fn flush_if_needed(&self) -> Result<usize> {
        self.inner.ensure_open()?;
        self.inner.flush_if_needed()
    }

    /// Delete every stored file and reset all known keys to their defaults
    ///
    /// The reset records are dirty, exactly as on a first run.
    pub fn delete_all(&self) -> Result<()> {
        self.inner.ensure_open()?;
        let mut state = self.inner.state.lock();
        self.inner.durable.delete_all()?;

        let state = &mut *state;
        state.pending.clear();
        state.records.clear();
        for (id, known) in &state.known {
            state
                .records
                .insert(id.clone(), known.default_record(id, true));
        }
        info!(
            target: "keystash::store",
            keys = state.known.len(),
            "Deleted all stored data"
        );
        Ok(())
    }

    /// Stop the background task, flush, and refuse further operations
    ///
    /// Calling `close` again does nothing.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(task) = self.flusher.lock().take() {
            task.stop();
        }
        let written = self.inner.flush()?;
        info!(target: "keystash::store", written, "Closed save store");
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Whether a key with this id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.inner.state.lock().records.contains_key(id)
    }

    /// Registered key ids, sorted
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.lock().records.keys().cloned().collect()
    }

    /// Whether a registered key has unflushed changes
    pub fn is_dirty(&self, id: &str) -> bool {
        self.inner
            .state
            .lock()
            .records
            .get(id)
            .map_or(false, |r| r.dirty)
    }

    /// Number of records with unflushed changes
    pub fn dirty_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .records
            .values()
            .filter(|r| r.dirty)
            .count()
    }

    /// Whether a soft save is waiting for the next tick
    pub fn needs_flush(&self) -> bool {
        self.inner.needs_flush.load(Ordering::Acquire)
    }

    /// Whether [`SaveStore::close`] has run
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Counters since open
    pub fn stats(&self) -> StoreStats {
        self.inner.state.lock().stats.clone()
    }

    /// Warnings reported by this store and its registry
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        self.inner.registry.diagnostics()
    }

    /// Codec registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Migration registry; register migrations before the keys they apply to
    pub fn migrations(&self) -> &Arc<MigrationRegistry> {
        &self.inner.migrations
    }

    /// Configuration
    pub fn config(&self) -> &SaveStoreConfig {
        &self.inner.config
    }

    /// Directory holding the entry files
    pub fn dir(&self) -> &Path {
        self.inner.durable.dir()
    }
}

impl Drop for SaveStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "keystash::store", error = %e, "Final flush failed on drop");
        }
    }
}

impl fmt::Debug for SaveStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveStore")
            .field("dir", &self.dir())
            .field("closed", &self.is_closed())
            .field("needs_flush", &self.needs_flush())
            .finish()
    }
}

impl StoreInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::StoreClosed)
        } else {
            Ok(())
        }
    }

    fn flush_if_needed(&self) -> Result<usize> {
        if self.needs_flush.load(Ordering::Acquire) {
            self.flush()
        } else {
            Ok(0)
        }
    }

    fn flush(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let dirty: Vec<&Record> = state.records.values().filter(|r| r.dirty).collect();
        if dirty.is_empty() {
            self.needs_flush.store(false, Ordering::Release);
            return Ok(0);
        }

        let batch = dirty.len();
        let result = dirty
            .iter()
            .map(|record| record.to_entry(&self.registry))
            .collect::<Result<Vec<_>>>()
            .and_then(|entries| self.durable.save(&entries));

        let state = &mut *state;
        match result {
            Ok(written) => {
                for record in state.records.values_mut() {
                    record.dirty = false;
                }
                self.needs_flush.store(false, Ordering::Release);
                state.stats.flushes += 1;
                state.stats.files_written += written as u64;
                state.stats.last_error = None;
                debug!(target: "keystash::store", written, "Flushed dirty records");
                Ok(written)
            }
            Err(e) => {
                state.stats.failed_flushes += 1;
                state.stats.last_error = Some(e.to_string());
                self.registry.diagnostics().report(Diagnostic::FlushFailed {
                    records: batch,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Mutable view of one value, holding the store lock
///
/// Returned by [`SaveStore::edit`]; the record is dirty after release.
pub struct EditGuard<'a, T> {
    value: MappedMutexGuard<'a, T>,
}

impl<T> Deref for EditGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for EditGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for EditGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EditGuard").field(&*self.value).finish()
    }
}

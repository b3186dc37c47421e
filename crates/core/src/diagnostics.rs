//! Recoverable warnings
//!
//! Problems that never abort an operation (unknown fields, failed
//! conversions, skipped files, migration gaps) are reported here. Each report
//! is logged through `tracing` and retained in a bounded in-memory sink so the
//! embedding application and tests can inspect what happened.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Default number of diagnostics retained before the oldest are dropped
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 1024;

/// A recoverable problem observed while reading or writing data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Tagged payload contained field ids the current schema does not declare
    UnknownFields {
        /// Structural type being read
        type_name: String,
        /// Unconsumed field ids, sorted
        field_ids: Vec<String>,
    },
    /// A stored field could not be assigned to its declared member
    FieldConversionFailed {
        /// Structural type being read
        type_name: String,
        /// Stable field id
        field_id: String,
        /// Failure description
        reason: String,
    },
    /// Two members of one schema share a stable field id
    DuplicateFieldId {
        /// Structural type
        type_name: String,
        /// Repeated field id
        field_id: String,
    },
    /// A stored type name has no codec in this process
    UnresolvableStoredType {
        /// Where the name was found (key id or `Type.field`)
        context: String,
        /// The unknown type name
        type_name: String,
    },
    /// Stored type differs from the type declared by the key
    StoredTypeMismatch {
        /// Key id
        key: String,
        /// Type name on disk
        stored: String,
        /// Type name declared by the key
        declared: String,
    },
    /// Payload bytes could not be decoded
    DeserializeFailed {
        /// Key id
        key: String,
        /// Failure description
        reason: String,
    },
    /// Migration from the stored version did not complete
    MigrationFailed {
        /// Key id
        key: String,
        /// Type being migrated
        type_name: String,
        /// Stored data version
        from: u32,
        /// Current codec version
        to: u32,
        /// Failure description
        reason: String,
    },
    /// A storage file was skipped during load
    SkippedFile {
        /// File path
        path: PathBuf,
        /// Failure description
        reason: String,
    },
    /// A flush attempt failed; the affected records stay dirty
    FlushFailed {
        /// Number of records that were part of the batch
        records: usize,
        /// Failure description
        reason: String,
    },
}

impl Diagnostic {
    /// Short machine-friendly kind label
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::UnknownFields { .. } => "unknown_fields",
            Diagnostic::FieldConversionFailed { .. } => "field_conversion_failed",
            Diagnostic::DuplicateFieldId { .. } => "duplicate_field_id",
            Diagnostic::UnresolvableStoredType { .. } => "unresolvable_stored_type",
            Diagnostic::StoredTypeMismatch { .. } => "stored_type_mismatch",
            Diagnostic::DeserializeFailed { .. } => "deserialize_failed",
            Diagnostic::MigrationFailed { .. } => "migration_failed",
            Diagnostic::SkippedFile { .. } => "skipped_file",
            Diagnostic::FlushFailed { .. } => "flush_failed",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownFields {
                type_name,
                field_ids,
            } => write!(
                f,
                "{}: ignoring unknown fields [{}]",
                type_name,
                field_ids.join(", ")
            ),
            Diagnostic::FieldConversionFailed {
                type_name,
                field_id,
                reason,
            } => write!(
                f,
                "{}.{}: kept default value ({})",
                type_name, field_id, reason
            ),
            Diagnostic::DuplicateFieldId {
                type_name,
                field_id,
            } => write!(f, "{}: duplicate field id '{}'", type_name, field_id),
            Diagnostic::UnresolvableStoredType { context, type_name } => {
                write!(f, "{}: stored type '{}' cannot be resolved", context, type_name)
            }
            Diagnostic::StoredTypeMismatch {
                key,
                stored,
                declared,
            } => write!(
                f,
                "{}: stored as '{}' but declared as '{}'",
                key, stored, declared
            ),
            Diagnostic::DeserializeFailed { key, reason } => {
                write!(f, "{}: failed to deserialize ({})", key, reason)
            }
            Diagnostic::MigrationFailed {
                key,
                type_name,
                from,
                to,
                reason,
            } => write!(
                f,
                "{}: migration of '{}' from v{} to v{} failed ({})",
                key, type_name, from, to, reason
            ),
            Diagnostic::SkippedFile { path, reason } => {
                write!(f, "skipped {} ({})", path.display(), reason)
            }
            Diagnostic::FlushFailed { records, reason } => {
                write!(f, "flush of {} records failed ({})", records, reason)
            }
        }
    }
}

/// Bounded, thread-safe diagnostics sink
///
/// Shared through `Arc` by the registry, the durable store and the save store.
#[derive(Debug)]
pub struct Diagnostics {
    entries: Mutex<VecDeque<Diagnostic>>,
    reported_once: Mutex<HashSet<String>>,
    capacity: usize,
}

impl Diagnostics {
    /// Create a sink retaining at most `capacity` diagnostics
    pub fn new(capacity: usize) -> Self {
        Diagnostics {
            entries: Mutex::new(VecDeque::new()),
            reported_once: Mutex::new(HashSet::new()),
            capacity: capacity.max(1),
        }
    }

    /// Log and retain a diagnostic
    pub fn report(&self, diagnostic: Diagnostic) {
        warn!(
            target: "keystash::diagnostics",
            kind = diagnostic.kind(),
            "{}",
            diagnostic
        );

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(diagnostic);
    }

    /// Report a diagnostic only the first time `once_key` is seen
    ///
    /// Returns true if the diagnostic was reported.
    pub fn report_once(&self, once_key: &str, diagnostic: Diagnostic) -> bool {
        if !self.reported_once.lock().insert(once_key.to_string()) {
            return false;
        }
        self.report(diagnostic);
        true
    }

    /// Copy of all retained diagnostics, oldest first
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Remove and return all retained diagnostics
    pub fn take(&self) -> Vec<Diagnostic> {
        self.entries.lock().drain(..).collect()
    }

    /// Whether any retained diagnostic matches the predicate
    pub fn any(&self, predicate: impl Fn(&Diagnostic) -> bool) -> bool {
        self.entries.lock().iter().any(predicate)
    }

    /// Number of retained diagnostics
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no diagnostics are retained
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of retained diagnostics
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTICS_CAPACITY)
    }
}

//! Testing utilities for the durable store
//!
//! - **Crash injection**: a [`StorageBackend`](crate::StorageBackend) that
//!   stops working at a chosen step of the write path, leaving the directory
//!   exactly as a killed process would
//!
//! # Example
//!
//! ```ignore
//! use keystash_durability::testing::{CrashPoint, CrashingBackend};
//!
//! let backend = Arc::new(CrashingBackend::new(CrashPoint::AfterBackup));
//! let store = DurableStore::with_backend(config, backend.clone(), diagnostics)?;
//! assert!(store.save_entry(&entry).is_err());
//! assert!(backend.has_crashed());
//! ```

mod crash;

pub use crash::{CrashPoint, CrashingBackend};

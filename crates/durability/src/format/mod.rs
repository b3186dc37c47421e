//! On-disk byte formats

pub mod entry;

pub use entry::{EntryPayload, ENTRY_FORMAT_VERSION, ENTRY_MAGIC};

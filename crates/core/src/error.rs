//! Error types for keystash
//!
//! This module defines the error taxonomy shared by every layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category      | Variants                                                        | Handling                        |
//! |---------------|-----------------------------------------------------------------|---------------------------------|
//! | Configuration | `UnresolvableType`, `NotSerializable`, `KeyTypeMismatch`, `StoreClosed`, `InvalidConfig` | Surfaced to the caller          |
//! | Format        | `InvalidMagic`, `UnsupportedFormatVersion`, `UnexpectedEof`, `InvalidUtf8`, `InvalidLength`, `Corruption` | Fatal for one entry or file |
//! | Compatibility | `Conversion`, `MissingMigrator`, `StoredTypeMismatch`, `ValueTypeMismatch` | Fall back to default + warning |
//! | I/O           | `Io`                                                            | Reported, dirty state kept      |

use std::io;
use thiserror::Error;

/// Result type alias for keystash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for keystash
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No codec can be resolved for the named type
    #[error("No codec registered for type '{0}'")]
    UnresolvableType(String),

    /// The type exists but has not opted in to persistence
    #[error("Type '{0}' is not serializable: provide a schema or register a codec")]
    NotSerializable(String),

    /// The same key id was used with two different value types
    #[error("Key '{key}' holds '{existing}', cannot be accessed as '{requested}'")]
    KeyTypeMismatch {
        /// Key id
        key: String,
        /// Type name of the existing record
        existing: String,
        /// Type name requested by the caller
        requested: String,
    },

    /// The store was closed and no longer accepts operations
    #[error("Store has been closed")]
    StoreClosed,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Magic marker did not match
    #[error("Invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected marker
        expected: [u8; 4],
        /// Marker found in the data
        found: [u8; 4],
    },

    /// Format version is not supported by this build
    #[error("Unsupported format version {found} (supported: {supported})")]
    UnsupportedFormatVersion {
        /// Version found in the data
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// Input ended before a complete value could be read
    #[error("Unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the read
        needed: usize,
        /// Bytes left in the input
        remaining: usize,
    },

    /// String bytes were not valid UTF-8
    #[error("Invalid UTF-8 in string data")]
    InvalidUtf8,

    /// A length prefix was negative (other than the null sentinel) or too large
    #[error("Invalid length prefix: {0}")]
    InvalidLength(i64),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A stored value could not be converted to the declared type
    #[error("Cannot convert '{from}' to '{to}': {reason}")]
    Conversion {
        /// Stored type name
        from: String,
        /// Declared type name
        to: String,
        /// Why the conversion failed
        reason: String,
    },

    /// The migration chain has a gap
    #[error("No migrator for '{type_name}' from version {from} (target version {target})")]
    MissingMigrator {
        /// Type being migrated
        type_name: String,
        /// Version with no outgoing migrator
        from: u32,
        /// Version the chain was supposed to reach
        target: u32,
    },

    /// The stored type name does not match the declared key type
    #[error("Stored type '{stored}' does not match declared type '{declared}'")]
    StoredTypeMismatch {
        /// Type name recorded in storage
        stored: String,
        /// Type name declared by the key
        declared: String,
    },

    /// A type-erased value did not hold the type its codec expects
    #[error("Value passed to codec for '{expected}' has a different runtime type")]
    ValueTypeMismatch {
        /// Type name the codec handles
        expected: String,
    },
}

impl Error {
    /// Build a conversion error
    pub fn conversion(
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Conversion {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Whether the affected record can fall back to its default value
    ///
    /// Compatibility and format errors concern one stored value; configuration
    /// errors are caller misuse and I/O errors are retried by the next flush.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Conversion { .. }
                | Error::MissingMigrator { .. }
                | Error::StoredTypeMismatch { .. }
                | Error::ValueTypeMismatch { .. }
                | Error::InvalidMagic { .. }
                | Error::UnsupportedFormatVersion { .. }
                | Error::UnexpectedEof { .. }
                | Error::InvalidUtf8
                | Error::InvalidLength(_)
                | Error::Corruption(_)
        )
    }

    /// Whether this error is caller misuse that must surface synchronously
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnresolvableType(_)
                | Error::NotSerializable(_)
                | Error::KeyTypeMismatch { .. }
                | Error::StoreClosed
                | Error::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_display_unresolvable_type() {
        let err = Error::UnresolvableType("PlayerState".to_string());
        let msg = err.to_string();
        assert!(msg.contains("No codec"));
        assert!(msg.contains("PlayerState"));
    }

    #[test]
    fn test_error_display_key_type_mismatch() {
        let err = Error::KeyTypeMismatch {
            key: "player_state".to_string(),
            existing: "PlayerState".to_string(),
            requested: "i32".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("player_state"));
        assert!(msg.contains("PlayerState"));
        assert!(msg.contains("i32"));
    }

    #[test]
    fn test_error_display_conversion() {
        let err = Error::conversion("string", "i32", "invalid digit");
        let msg = err.to_string();
        assert!(msg.contains("string"));
        assert!(msg.contains("i32"));
        assert!(msg.contains("invalid digit"));
    }

    #[test]
    fn test_error_display_missing_migrator() {
        let err = Error::MissingMigrator {
            type_name: "Inventory".to_string(),
            from: 2,
            target: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Inventory"));
        assert!(msg.contains("version 2"));
        assert!(msg.contains("target version 3"));
    }

    #[test]
    fn test_error_display_invalid_magic() {
        let err = Error::InvalidMagic {
            expected: *b"KSVE",
            found: *b"XXXX",
        };
        assert!(err.to_string().contains("Invalid magic"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::conversion("a", "b", "c").is_recoverable());
        assert!(Error::Corruption("bad".into()).is_recoverable());
        assert!(Error::StoredTypeMismatch {
            stored: "a".into(),
            declared: "b".into()
        }
        .is_recoverable());
        assert!(!Error::UnresolvableType("x".into()).is_recoverable());
        assert!(!Error::StoreClosed.is_recoverable());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::Other, "x")).is_recoverable());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(Error::NotSerializable("x".into()).is_configuration());
        assert!(Error::StoreClosed.is_configuration());
        assert!(!Error::InvalidUtf8.is_configuration());
    }
}

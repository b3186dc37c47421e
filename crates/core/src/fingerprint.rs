//! Numeric type fingerprint
//!
//! The fingerprint is the CRC32 of the UTF-8 wire type name, stored as `i32`
//! in every entry envelope. It is carried for diagnostics only: two names may
//! collide, so compatibility checks always compare type names.

/// Fingerprint of a wire type name
pub fn type_fingerprint(type_name: &str) -> i32 {
    crc32fast::hash(type_name.as_bytes()) as i32
}

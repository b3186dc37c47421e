//! Core types for keystash
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: error taxonomy and `Result` alias
//! - Diagnostics: recoverable-warning channel
//! - BinaryWriter / BinaryReader: little-endian wire primitives
//! - Decimal: exact base-10 numbers
//! - DynValue: type-neutral value used for cross-type conversion
//! - type_fingerprint: numeric type id carried in entry envelopes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod decimal;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod value;

pub use binary::{BinaryReader, BinaryWriter, NULL_LENGTH};
pub use decimal::{Decimal, DecimalError, MAX_DECIMAL_SCALE};
pub use diagnostics::{Diagnostic, Diagnostics, DEFAULT_DIAGNOSTICS_CAPACITY};
pub use error::{Error, Result};
pub use fingerprint::type_fingerprint;
pub use value::DynValue;

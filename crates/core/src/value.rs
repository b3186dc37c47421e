//! Type-neutral value used for cross-type conversion
//!
//! When a stored field's type differs from the declared member type, the
//! stored value is lowered to a [`DynValue`] by its codec and raised again by
//! the declared type's codec. Only scalar-like values have a `DynValue` form;
//! composites convert only when their type names match exactly.

use crate::decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// Scalar value with its original kind preserved
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// Absent optional value
    Null,
    /// Boolean
    Bool(bool),
    /// Any signed integer
    Int(i128),
    /// Any unsigned integer
    UInt(u128),
    /// Any float
    Float(f64),
    /// Exact decimal
    Decimal(Decimal),
    /// Unicode scalar
    Char(char),
    /// UTF-8 text
    String(String),
    /// Byte buffer
    Bytes(Vec<u8>),
    /// Unique identifier
    Guid(Uuid),
    /// Enumeration value
    Enum {
        /// Wire type name of the enum
        type_name: String,
        /// Variant name, when the value maps to a declared variant
        name: Option<String>,
        /// Underlying integer value
        value: i128,
    },
}

impl DynValue {
    /// Human-readable kind, used in conversion errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            DynValue::Null => "null",
            DynValue::Bool(_) => "bool",
            DynValue::Int(_) => "signed integer",
            DynValue::UInt(_) => "unsigned integer",
            DynValue::Float(_) => "float",
            DynValue::Decimal(_) => "decimal",
            DynValue::Char(_) => "char",
            DynValue::String(_) => "string",
            DynValue::Bytes(_) => "bytes",
            DynValue::Guid(_) => "guid",
            DynValue::Enum { .. } => "enum",
        }
    }

    /// Whether this is a numeric kind (including enums by their value)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DynValue::Int(_)
                | DynValue::UInt(_)
                | DynValue::Float(_)
                | DynValue::Decimal(_)
                | DynValue::Enum { .. }
        )
    }

    /// Whether this is [`DynValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, DynValue::Null)
    }
}

impl fmt::Display for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynValue::Null => Ok(()),
            DynValue::Bool(b) => write!(f, "{}", b),
            DynValue::Int(i) => write!(f, "{}", i),
            DynValue::UInt(u) => write!(f, "{}", u),
            DynValue::Float(x) => write!(f, "{}", x),
            DynValue::Decimal(d) => write!(f, "{}", d),
            DynValue::Char(c) => write!(f, "{}", c),
            DynValue::String(s) => f.write_str(s),
            DynValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            DynValue::Guid(g) => write!(f, "{}", g),
            DynValue::Enum { name, value, .. } => match name {
                Some(n) => f.write_str(n),
                None => write!(f, "{}", value),
            },
        }
    }
}

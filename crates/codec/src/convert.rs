//! Cross-type value conversion
//!
//! When the tagged reader finds a field stored under a different type name
//! than the member now declares, the stored value is lowered to a
//! [`DynValue`] and raised into the declared type with these rules:
//!
//! - numeric and primitive kinds convert between each other when the value
//!   fits (floats round half to even, out-of-range values fail)
//! - strings parse into numbers, bools, chars, decimals and GUIDs
//! - anything converts to a string through its display form
//! - GUIDs accept their 16-byte form and their string form
//! - enums convert to scalars through their underlying value
//!
//! Enum targets are handled by [`EnumCodec`](crate::enumeration::EnumCodec).
//! Conversions not listed fail with [`Error::Conversion`].

use keystash_core::{Decimal, DynValue, Error, Result};
use uuid::Uuid;

fn unsupported(value: &DynValue, to: &str) -> Error {
    Error::conversion(value.kind_name(), to, "unsupported conversion")
}

fn out_of_range(value: &DynValue, to: &str) -> Error {
    Error::conversion(value.kind_name(), to, format!("value {} out of range", value))
}

fn unparsable(text: &str, to: &str) -> Error {
    Error::conversion("string", to, format!("cannot parse '{}'", text))
}

/// Round to the nearest integer, ties to even
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (rounded - x).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

/// Convert to a signed integer
pub fn to_i128(value: &DynValue) -> Result<i128> {
    const TARGET: &str = "integer";
    match value {
        DynValue::Int(i) => Ok(*i),
        DynValue::UInt(u) => i128::try_from(*u).map_err(|_| out_of_range(value, TARGET)),
        DynValue::Float(x) => {
            // i128 spans roughly +/-1.7e38
            if !x.is_finite() || x.abs() >= 1.7e38 {
                return Err(out_of_range(value, TARGET));
            }
            Ok(round_half_even(*x) as i128)
        }
        DynValue::Decimal(d) => Ok(d.round_to_i128()),
        DynValue::Bool(b) => Ok(i128::from(*b)),
        DynValue::Char(c) => Ok(i128::from(u32::from(*c))),
        DynValue::String(s) => s.trim().parse().map_err(|_| unparsable(s, TARGET)),
        DynValue::Enum { value, .. } => Ok(*value),
        DynValue::Null | DynValue::Bytes(_) | DynValue::Guid(_) => Err(unsupported(value, TARGET)),
    }
}

/// Convert to an unsigned integer
pub fn to_u128(value: &DynValue) -> Result<u128> {
    const TARGET: &str = "unsigned integer";
    match value {
        DynValue::UInt(u) => Ok(*u),
        DynValue::String(s) => s.trim().parse().map_err(|_| unparsable(s, TARGET)),
        other => {
            let wide = to_i128(other)?;
            u128::try_from(wide).map_err(|_| out_of_range(other, TARGET))
        }
    }
}

/// Convert to a signed integer of a specific width
pub fn to_signed<T: TryFrom<i128>>(value: &DynValue, to: &str) -> Result<T> {
    let wide = to_i128(value)?;
    T::try_from(wide).map_err(|_| out_of_range(value, to))
}

/// Convert to an unsigned integer of a specific width
pub fn to_unsigned<T: TryFrom<u128>>(value: &DynValue, to: &str) -> Result<T> {
    let wide = to_u128(value)?;
    T::try_from(wide).map_err(|_| out_of_range(value, to))
}

/// Convert to a float
pub fn to_f64(value: &DynValue) -> Result<f64> {
    const TARGET: &str = "float";
    match value {
        DynValue::Float(x) => Ok(*x),
        DynValue::Int(i) => Ok(*i as f64),
        DynValue::UInt(u) => Ok(*u as f64),
        DynValue::Decimal(d) => Ok(d.to_f64()),
        DynValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        DynValue::String(s) => s.trim().parse().map_err(|_| unparsable(s, TARGET)),
        DynValue::Enum { value, .. } => Ok(*value as f64),
        DynValue::Null | DynValue::Char(_) | DynValue::Bytes(_) | DynValue::Guid(_) => {
            Err(unsupported(value, TARGET))
        }
    }
}

/// Convert to a bool
pub fn to_bool(value: &DynValue) -> Result<bool> {
    const TARGET: &str = "bool";
    match value {
        DynValue::Bool(b) => Ok(*b),
        DynValue::Int(i) => Ok(*i != 0),
        DynValue::UInt(u) => Ok(*u != 0),
        DynValue::Float(x) => Ok(*x != 0.0),
        DynValue::Decimal(d) => Ok(d.mantissa() != 0),
        DynValue::Enum { value, .. } => Ok(*value != 0),
        DynValue::String(s) => {
            let t = s.trim();
            if t.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if t.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                Err(unparsable(s, TARGET))
            }
        }
        DynValue::Null | DynValue::Char(_) | DynValue::Bytes(_) | DynValue::Guid(_) => {
            Err(unsupported(value, TARGET))
        }
    }
}

/// Convert to a char
pub fn to_char(value: &DynValue) -> Result<char> {
    const TARGET: &str = "char";
    match value {
        DynValue::Char(c) => Ok(*c),
        DynValue::Int(_) | DynValue::UInt(_) | DynValue::Enum { .. } => {
            let code = to_unsigned::<u32>(value, TARGET)?;
            char::from_u32(code).ok_or_else(|| out_of_range(value, TARGET))
        }
        DynValue::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(unparsable(s, TARGET)),
            }
        }
        _ => Err(unsupported(value, TARGET)),
    }
}

/// Convert to a decimal
pub fn to_decimal(value: &DynValue) -> Result<Decimal> {
    const TARGET: &str = "decimal";
    match value {
        DynValue::Decimal(d) => Ok(*d),
        DynValue::Int(i) => Ok(Decimal::from_i128(*i)),
        DynValue::UInt(u) => i128::try_from(*u)
            .map(Decimal::from_i128)
            .map_err(|_| out_of_range(value, TARGET)),
        DynValue::Float(x) => Decimal::from_f64(*x).ok_or_else(|| out_of_range(value, TARGET)),
        DynValue::Bool(b) => Ok(Decimal::from_i128(i128::from(*b))),
        DynValue::Enum { value, .. } => Ok(Decimal::from_i128(*value)),
        DynValue::String(s) => s.parse().map_err(|_| unparsable(s, TARGET)),
        DynValue::Null | DynValue::Char(_) | DynValue::Bytes(_) | DynValue::Guid(_) => {
            Err(unsupported(value, TARGET))
        }
    }
}

/// Convert to a string; every value has a string form
pub fn to_string(value: &DynValue) -> String {
    value.to_string()
}

/// Convert to a GUID from its GUID, 16-byte or string form
pub fn to_guid(value: &DynValue) -> Result<Uuid> {
    const TARGET: &str = "guid";
    match value {
        DynValue::Guid(g) => Ok(*g),
        DynValue::Bytes(b) => Uuid::from_slice(b).map_err(|_| {
            Error::conversion("bytes", TARGET, format!("expected 16 bytes, found {}", b.len()))
        }),
        DynValue::String(s) => Uuid::parse_str(s.trim()).map_err(|_| unparsable(s, TARGET)),
        _ => Err(unsupported(value, TARGET)),
    }
}

/// Convert to a byte buffer
pub fn to_bytes(value: &DynValue) -> Result<Vec<u8>> {
    match value {
        DynValue::Bytes(b) => Ok(b.clone()),
        _ => Err(unsupported(value, "bytes")),
    }
}

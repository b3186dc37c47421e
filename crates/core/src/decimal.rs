//! Fixed-point decimal value
//!
//! A base-10 number stored as an `i128` mantissa and a power-of-ten scale
//! (`value = mantissa / 10^scale`). Equality and hashing compare the
//! normalized form, so `1.50 == 1.5`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Largest supported scale (digits after the decimal point)
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Exact base-10 number
#[derive(Debug, Clone, Copy, Default)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

/// Error returned when a decimal cannot be built or parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    /// Scale exceeds [`MAX_DECIMAL_SCALE`]
    #[error("decimal scale {0} exceeds maximum {MAX_DECIMAL_SCALE}")]
    ScaleTooLarge(u32),
    /// Text is not a decimal literal
    #[error("invalid decimal literal '{0}'")]
    Invalid(String),
    /// Value does not fit the mantissa
    #[error("decimal overflow")]
    Overflow,
}

impl Decimal {
    /// Zero
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    /// Build from mantissa and scale
    pub fn new(mantissa: i128, scale: u32) -> Result<Self, DecimalError> {
        if scale > MAX_DECIMAL_SCALE {
            return Err(DecimalError::ScaleTooLarge(scale));
        }
        Ok(Decimal { mantissa, scale })
    }

    /// Integer value with scale 0
    pub fn from_i128(value: i128) -> Self {
        Decimal {
            mantissa: value,
            scale: 0,
        }
    }

    /// Closest decimal to a finite float (shortest round-trip representation)
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        value.to_string().parse().ok()
    }

    /// Raw mantissa
    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    /// Digits after the decimal point
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Same value with trailing fractional zeros removed
    pub fn normalize(&self) -> Self {
        let mut mantissa = self.mantissa;
        let mut scale = self.scale;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Decimal { mantissa, scale }
    }

    /// Lossy conversion to f64
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Round to an integer, ties to even
    pub fn round_to_i128(&self) -> i128 {
        if self.scale == 0 {
            return self.mantissa;
        }
        let divisor = 10i128.pow(self.scale);
        let quotient = self.mantissa / divisor;
        let remainder = (self.mantissa % divisor).abs();
        let twice = remainder * 2;
        let round_away = match twice.cmp(&divisor) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => quotient % 2 != 0,
        };
        if !round_away {
            quotient
        } else if self.mantissa < 0 {
            quotient - 1
        } else {
            quotient + 1
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let a = self.normalize();
        let b = other.normalize();
        a.mantissa == b.mantissa && a.scale == b.scale
    }
}

impl Eq for Decimal {}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let n = self.normalize();
        n.mantissa.hash(state);
        n.scale.hash(state);
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || DecimalError::Invalid(s.to_string());
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let scale = frac_part.len() as u32;
        if scale > MAX_DECIMAL_SCALE {
            return Err(DecimalError::ScaleTooLarge(scale));
        }
        let digits = format!("{}{}", int_part, frac_part);
        let magnitude: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| DecimalError::Overflow)?
        };
        let mantissa = if negative { -magnitude } else { magnitude };
        Ok(Decimal { mantissa, scale })
    }
}

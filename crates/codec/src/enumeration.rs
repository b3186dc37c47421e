//! Enumeration codecs
//!
//! An enum is stored as its underlying integer through the registry's codec
//! for that integer type. Reading a value that maps to no declared variant is
//! a conversion error.

use crate::codec::{erased, Codec, CodecKind, ErasedCodec};
use crate::convert;
use crate::persist::Persist;
use crate::registry::Registry;
use keystash_core::{BinaryReader, BinaryWriter, DynValue, Error, Result};
use std::marker::PhantomData;
use std::sync::Arc;

/// A fieldless enum with an integer representation
///
/// Usually implemented with [`persist_enum!`](crate::persist_enum).
pub trait PersistEnum: Persist + Copy {
    /// Underlying integer type
    type Repr: Persist + Copy + Into<i128> + TryFrom<i128>;

    /// Integer value of this variant
    fn to_repr(self) -> Self::Repr;

    /// Variant for an integer value, if one is declared
    fn from_repr(repr: Self::Repr) -> Option<Self>;

    /// Declared variants with their names
    fn variants() -> &'static [(&'static str, Self)];

    /// Name of this variant
    fn variant_name(self) -> Option<&'static str> {
        let raw: i128 = self.to_repr().into();
        Self::variants()
            .iter()
            .find(|(_, v)| Into::<i128>::into(v.to_repr()) == raw)
            .map(|(name, _)| *name)
    }
}

/// Codec delegating to the integer codec of `E::Repr`
pub struct EnumCodec<E>(PhantomData<fn() -> E>);

impl<E: PersistEnum> EnumCodec<E> {
    /// Erased codec for `E`
    pub fn erased() -> Arc<dyn ErasedCodec> {
        erased::<E, _>(CodecKind::Enum, EnumCodec::<E>(PhantomData))
    }

    fn from_i128(raw: i128) -> Result<E> {
        let repr = E::Repr::try_from(raw).map_err(|_| {
            Error::conversion(
                "integer",
                E::type_name(),
                format!("{} does not fit {}", raw, E::Repr::type_name()),
            )
        })?;
        E::from_repr(repr).ok_or_else(|| {
            Error::conversion("integer", E::type_name(), format!("undefined value {}", raw))
        })
    }

    fn from_name(text: &str) -> Result<E> {
        let trimmed = text.trim();
        if let Some((_, variant)) = E::variants()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        {
            return Ok(*variant);
        }
        match trimmed.parse::<i128>() {
            Ok(raw) => Self::from_i128(raw),
            Err(_) => Err(Error::conversion(
                "string",
                E::type_name(),
                format!("no variant named '{}'", trimmed),
            )),
        }
    }
}

impl<E: PersistEnum> Codec<E> for EnumCodec<E> {
    fn write(&self, registry: &Registry, writer: &mut BinaryWriter, value: &E) -> Result<()> {
        registry.write(writer, &value.to_repr())
    }

    fn read(&self, registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<E> {
        let repr = registry.read::<E::Repr>(reader)?;
        Self::from_i128(repr.into())
    }

    fn to_dynamic(&self, _registry: &Registry, value: &E) -> Option<DynValue> {
        Some(DynValue::Enum {
            type_name: E::type_name(),
            name: value.variant_name().map(str::to_string),
            value: value.to_repr().into(),
        })
    }

    fn from_dynamic(&self, _registry: &Registry, value: &DynValue) -> Result<E> {
        match value {
            DynValue::String(s) => Self::from_name(s),
            DynValue::Enum {
                type_name, value, ..
            } => {
                if *type_name == E::type_name() {
                    Self::from_i128(*value)
                } else {
                    Err(Error::conversion(
                        type_name.as_str(),
                        E::type_name(),
                        "cannot convert between enum types",
                    ))
                }
            }
            other => Self::from_i128(convert::to_i128(other)?),
        }
    }
}

/// Implement [`Persist`] and [`PersistEnum`] for a fieldless enum
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Class { Warrior = 1, Mage = 2 }
///
/// persist_enum!(Class as u8, "Class", { Warrior = 1, Mage = 2 });
/// ```
#[macro_export]
macro_rules! persist_enum {
    ($ty:ident as $repr:ty, $name:expr, { $($variant:ident = $value:expr),+ $(,)? }) => {
        impl $crate::Persist for $ty {
            fn type_name() -> String {
                String::from($name)
            }

            fn build_codec(
                _registry: &$crate::Registry,
            ) -> $crate::Result<::std::sync::Arc<dyn $crate::ErasedCodec>> {
                Ok($crate::EnumCodec::<$ty>::erased())
            }
        }

        impl $crate::PersistEnum for $ty {
            type Repr = $repr;

            fn to_repr(self) -> $repr {
                match self {
                    $( $ty::$variant => $value, )+
                }
            }

            fn from_repr(repr: $repr) -> Option<Self> {
                $( if repr == $value { return Some($ty::$variant); } )+
                None
            }

            fn variants() -> &'static [(&'static str, Self)] {
                &[ $( (stringify!($variant), $ty::$variant), )+ ]
            }
        }
    };
}

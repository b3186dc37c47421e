//! Built-in scalar codecs
//!
//! Booleans, every fixed-width integer, floats, [`Decimal`], `char`,
//! `String`, [`Bytes`] (the byte-buffer type), [`Uuid`] and the common `glam`
//! math value types. All of them are registered when a [`Registry`] is built.

use crate::codec::{Codec, CodecKind, ErasedCodec};
use crate::convert;
use crate::persist::Persist;
use crate::registry::Registry;
use bytes::Bytes;
use glam::{IVec2, IVec3, Quat, Vec2, Vec3, Vec4};
use keystash_core::{BinaryReader, BinaryWriter, Decimal, DynValue, Error, Result};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Fixed encoding shared by all built-in scalar types
pub trait Scalar: Sized + Send + 'static {
    /// Wire type name
    const NAME: &'static str;

    /// Encode the value
    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()>;

    /// Decode a value
    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self>;

    /// Type-neutral form, if any
    fn to_dynamic(&self) -> Option<DynValue> {
        None
    }

    /// Raise a type-neutral value into this type
    fn from_dynamic(value: &DynValue) -> Result<Self> {
        Err(Error::conversion(value.kind_name(), Self::NAME, "unsupported conversion"))
    }

    /// Display form, if any
    fn render(&self) -> Option<String> {
        self.to_dynamic().map(|v| v.to_string())
    }
}

/// Codec for any [`Scalar`]
pub struct ScalarCodec<T>(PhantomData<fn() -> T>);

impl<T: Scalar> ScalarCodec<T> {
    /// Create the codec
    pub fn new() -> Self {
        ScalarCodec(PhantomData)
    }
}

impl<T: Scalar> Default for ScalarCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar + Persist> Codec<T> for ScalarCodec<T> {
    fn write(&self, _registry: &Registry, writer: &mut BinaryWriter, value: &T) -> Result<()> {
        value.write_scalar(writer)
    }

    fn read(&self, _registry: &Registry, reader: &mut BinaryReader<'_>) -> Result<T> {
        T::read_scalar(reader)
    }

    fn to_dynamic(&self, _registry: &Registry, value: &T) -> Option<DynValue> {
        value.to_dynamic()
    }

    fn from_dynamic(&self, _registry: &Registry, value: &DynValue) -> Result<T> {
        T::from_dynamic(value)
    }

    fn render(&self, _registry: &Registry, value: &T) -> Option<String> {
        value.render()
    }
}

/// Erased scalar codec for `T`
pub fn scalar_codec<T: Scalar + Persist>() -> Arc<dyn ErasedCodec> {
    crate::codec::erased::<T, _>(CodecKind::Scalar, ScalarCodec::<T>::new())
}

macro_rules! persist_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn type_name() -> String {
                    <$ty as Scalar>::NAME.to_string()
                }

                fn build_codec(_registry: &Registry) -> Result<Arc<dyn ErasedCodec>> {
                    Ok(scalar_codec::<$ty>())
                }
            }
        )*
    };
}

macro_rules! signed_scalar {
    ($($ty:ty => $name:literal, $write:ident, $read:ident;)*) => {
        $(
            impl Scalar for $ty {
                const NAME: &'static str = $name;

                fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
                    writer.$write(*self);
                    Ok(())
                }

                fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
                    reader.$read()
                }

                fn to_dynamic(&self) -> Option<DynValue> {
                    Some(DynValue::Int(i128::from(*self)))
                }

                fn from_dynamic(value: &DynValue) -> Result<Self> {
                    convert::to_signed(value, $name)
                }
            }
        )*
    };
}

macro_rules! unsigned_scalar {
    ($($ty:ty => $name:literal, $write:ident, $read:ident;)*) => {
        $(
            impl Scalar for $ty {
                const NAME: &'static str = $name;

                fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
                    writer.$write(*self);
                    Ok(())
                }

                fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
                    reader.$read()
                }

                fn to_dynamic(&self) -> Option<DynValue> {
                    Some(DynValue::UInt(u128::from(*self)))
                }

                fn from_dynamic(value: &DynValue) -> Result<Self> {
                    convert::to_unsigned(value, $name)
                }
            }
        )*
    };
}

signed_scalar! {
    i8 => "i8", write_i8, read_i8;
    i16 => "i16", write_i16, read_i16;
    i32 => "i32", write_i32, read_i32;
    i64 => "i64", write_i64, read_i64;
    i128 => "i128", write_i128, read_i128;
}

unsigned_scalar! {
    u8 => "u8", write_u8, read_u8;
    u16 => "u16", write_u16, read_u16;
    u32 => "u32", write_u32, read_u32;
    u64 => "u64", write_u64, read_u64;
    u128 => "u128", write_u128, read_u128;
}

impl Scalar for bool {
    const NAME: &'static str = "bool";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_bool(*self);
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_bool()
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Bool(*self))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_bool(value)
    }
}

impl Scalar for f32 {
    const NAME: &'static str = "f32";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_f32(*self);
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_f32()
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Float(f64::from(*self)))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_f64(value).map(|x| x as f32)
    }
}

impl Scalar for f64 {
    const NAME: &'static str = "f64";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_f64(*self);
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_f64()
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Float(*self))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_f64(value)
    }
}

impl Scalar for Decimal {
    const NAME: &'static str = "Decimal";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_i128(self.mantissa());
        writer.write_u32(self.scale());
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let mantissa = reader.read_i128()?;
        let scale = reader.read_u32()?;
        Decimal::new(mantissa, scale).map_err(|e| Error::Corruption(e.to_string()))
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Decimal(*self))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_decimal(value)
    }
}

impl Scalar for char {
    const NAME: &'static str = "char";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_char(*self);
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_char()
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Char(*self))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_char(value)
    }
}

impl Scalar for String {
    const NAME: &'static str = "String";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_str(self)
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_string()
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::String(self.clone()))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        Ok(convert::to_string(value))
    }
}

impl Scalar for Bytes {
    const NAME: &'static str = "Bytes";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_blob(self)
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        reader.read_blob().map(Bytes::from)
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Bytes(self.to_vec()))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_bytes(value).map(Bytes::from)
    }
}

impl Scalar for Uuid {
    const NAME: &'static str = "Guid";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_raw(self.as_bytes());
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let raw = reader.read_raw(16)?;
        Uuid::from_slice(raw).map_err(|e| Error::Corruption(e.to_string()))
    }

    fn to_dynamic(&self) -> Option<DynValue> {
        Some(DynValue::Guid(*self))
    }

    fn from_dynamic(value: &DynValue) -> Result<Self> {
        convert::to_guid(value)
    }
}

macro_rules! vector_scalar {
    ($($ty:ty => $name:literal, $elem:ty, $write:ident, $read:ident, [$($axis:ident),+];)*) => {
        $(
            impl Scalar for $ty {
                const NAME: &'static str = $name;

                fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
                    $( writer.$write(self.$axis); )+
                    Ok(())
                }

                fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
                    $( let $axis: $elem = reader.$read()?; )+
                    Ok(<$ty>::new($($axis),+))
                }

                fn render(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

vector_scalar! {
    Vec2 => "Vec2", f32, write_f32, read_f32, [x, y];
    Vec3 => "Vec3", f32, write_f32, read_f32, [x, y, z];
    Vec4 => "Vec4", f32, write_f32, read_f32, [x, y, z, w];
    IVec2 => "IVec2", i32, write_i32, read_i32, [x, y];
    IVec3 => "IVec3", i32, write_i32, read_i32, [x, y, z];
}

impl Scalar for Quat {
    const NAME: &'static str = "Quat";

    fn write_scalar(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
        writer.write_f32(self.w);
        Ok(())
    }

    fn read_scalar(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let x = reader.read_f32()?;
        let y = reader.read_f32()?;
        let z = reader.read_f32()?;
        let w = reader.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }

    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

persist_scalar!(
    bool, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64, Decimal, char, String,
    Bytes, Uuid, Vec2, Vec3, Vec4, Quat, IVec2, IVec3,
);

/// Register every built-in scalar codec
pub(crate) fn register_builtins(registry: &Registry) {
    registry.insert_builtin::<bool>();
    registry.insert_builtin::<i8>();
    registry.insert_builtin::<i16>();
    registry.insert_builtin::<i32>();
    registry.insert_builtin::<i64>();
    registry.insert_builtin::<i128>();
    registry.insert_builtin::<u8>();
    registry.insert_builtin::<u16>();
    registry.insert_builtin::<u32>();
    registry.insert_builtin::<u64>();
    registry.insert_builtin::<u128>();
    registry.insert_builtin::<f32>();
    registry.insert_builtin::<f64>();
    registry.insert_builtin::<Decimal>();
    registry.insert_builtin::<char>();
    registry.insert_builtin::<String>();
    registry.insert_builtin::<Bytes>();
    registry.insert_builtin::<Uuid>();
    registry.insert_builtin::<Vec2>();
    registry.insert_builtin::<Vec3>();
    registry.insert_builtin::<Vec4>();
    registry.insert_builtin::<Quat>();
    registry.insert_builtin::<IVec2>();
    registry.insert_builtin::<IVec3>();
}

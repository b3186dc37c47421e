//! Little-endian binary sink and source
//!
//! Every on-wire structure in keystash is built from these primitives.
//!
//! # Conventions
//!
//! - All integers and floats are little-endian
//! - Strings and byte arrays are length-prefixed with an `i32`
//! - A length of `-1` is the explicit null sentinel; it never means truncation
//! - `bool` is a single byte (0 or 1)
//! - `char` is its `u32` scalar value

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Length prefix used for null strings and arrays
pub const NULL_LENGTH: i32 = -1;

// Writes into a Vec<u8> cannot fail, so the io::Result is dropped
macro_rules! write_le {
    ($($(#[$doc:meta])* $name:ident => $ty:ty $(as $order:ty)?;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, value: $ty) {
                let _ = WriteBytesExt::$name$(::<$order>)?(&mut self.buf, value);
            }
        )*
    };
}

/// Append-only byte sink
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        BinaryWriter { buf: Vec::new() }
    }

    /// Create a writer with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        BinaryWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a bool as one byte
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Write a u8
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    write_le! {
        /// Write an i8
        write_i8 => i8;
        /// Write a u16
        write_u16 => u16 as LittleEndian;
        /// Write an i16
        write_i16 => i16 as LittleEndian;
        /// Write a u32
        write_u32 => u32 as LittleEndian;
        /// Write an i32
        write_i32 => i32 as LittleEndian;
        /// Write a u64
        write_u64 => u64 as LittleEndian;
        /// Write an i64
        write_i64 => i64 as LittleEndian;
        /// Write a u128
        write_u128 => u128 as LittleEndian;
        /// Write an i128
        write_i128 => i128 as LittleEndian;
        /// Write an f32
        write_f32 => f32 as LittleEndian;
        /// Write an f64
        write_f64 => f64 as LittleEndian;
    }

    /// Write a char as its u32 scalar value
    pub fn write_char(&mut self, value: char) {
        self.write_u32(value as u32);
    }

    /// Write a 4-byte magic marker
    pub fn write_magic(&mut self, magic: [u8; 4]) {
        self.buf.extend_from_slice(&magic);
    }

    /// Write raw bytes with no prefix
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write an element count or byte length prefix
    ///
    /// Fails if `len` does not fit the `i32` prefix.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| Error::InvalidLength(len as i64))?;
        self.write_i32(len);
        Ok(())
    }

    /// Write the null sentinel in place of a length prefix
    pub fn write_null(&mut self) {
        self.write_i32(NULL_LENGTH);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_blob(value.as_bytes())
    }

    /// Write a length-prefixed string, or the null sentinel
    pub fn write_opt_str(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) => self.write_str(s),
            None => {
                self.write_null();
                Ok(())
            }
        }
    }

    /// Write a length-prefixed byte array
    pub fn write_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a length-prefixed byte array, or the null sentinel
    pub fn write_opt_blob(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        match bytes {
            Some(b) => self.write_blob(b),
            None => {
                self.write_null();
                Ok(())
            }
        }
    }
}

/// Cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

macro_rules! read_le {
    ($(#[$doc:meta] $name:ident => $ty:ty, $size:expr, $read:ident;)*) => {
        $(
            #[$doc]
            pub fn $name(&mut self) -> Result<$ty> {
                let remaining = self.remaining();
                self.cursor
                    .$read::<LittleEndian>()
                    .map_err(|_| Error::UnexpectedEof { needed: $size, remaining })
            }
        )*
    };
}

impl<'a> BinaryReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        BinaryReader {
            cursor: Cursor::new(data),
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    /// Whether every byte has been consumed
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    read_le! {
        /// Read a u16
        read_u16 => u16, 2, read_u16;
        /// Read an i16
        read_i16 => i16, 2, read_i16;
        /// Read a u32
        read_u32 => u32, 4, read_u32;
        /// Read an i32
        read_i32 => i32, 4, read_i32;
        /// Read a u64
        read_u64 => u64, 8, read_u64;
        /// Read an i64
        read_i64 => i64, 8, read_i64;
        /// Read a u128
        read_u128 => u128, 16, read_u128;
        /// Read an i128
        read_i128 => i128, 16, read_i128;
        /// Read an f32
        read_f32 => f32, 4, read_f32;
        /// Read an f64
        read_f64 => f64, 8, read_f64;
    }

    /// Read a u8
    pub fn read_u8(&mut self) -> Result<u8> {
        let remaining = self.remaining();
        self.cursor.read_u8().map_err(|_| Error::UnexpectedEof {
            needed: 1,
            remaining,
        })
    }

    /// Read an i8
    pub fn read_i8(&mut self) -> Result<i8> {
        let remaining = self.remaining();
        self.cursor.read_i8().map_err(|_| Error::UnexpectedEof {
            needed: 1,
            remaining,
        })
    }

    /// Read a bool; any byte other than 0 or 1 is corruption
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Corruption(format!("invalid bool byte {:#04x}", other))),
        }
    }

    /// Read a char from its u32 scalar value
    pub fn read_char(&mut self) -> Result<char> {
        let raw = self.read_u32()?;
        char::from_u32(raw)
            .ok_or_else(|| Error::Corruption(format!("invalid char scalar {:#x}", raw)))
    }

    /// Read a 4-byte magic marker
    pub fn read_magic(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_raw(4)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(bytes);
        Ok(magic)
    }

    /// Borrow the next `len` bytes
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.position();
        let remaining = self.remaining();
        if len > remaining {
            return Err(Error::UnexpectedEof {
                needed: len,
                remaining,
            });
        }
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    /// Read a length prefix; `None` is the null sentinel
    pub fn read_len(&mut self) -> Result<Option<usize>> {
        match self.read_i32()? {
            NULL_LENGTH => Ok(None),
            n if n < 0 => Err(Error::InvalidLength(n as i64)),
            n => Ok(Some(n as usize)),
        }
    }

    /// Read a length-prefixed byte array without copying; `None` is null
    pub fn read_opt_blob_slice(&mut self) -> Result<Option<&'a [u8]>> {
        match self.read_len()? {
            None => Ok(None),
            Some(len) => self.read_raw(len).map(Some),
        }
    }

    /// Read a length-prefixed byte array; `None` is null
    pub fn read_opt_blob(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.read_opt_blob_slice()?.map(<[u8]>::to_vec))
    }

    /// Read a length-prefixed byte array; null reads as empty
    pub fn read_blob(&mut self) -> Result<Vec<u8>> {
        Ok(self.read_opt_blob()?.unwrap_or_default())
    }

    /// Read a length-prefixed string; `None` is null
    pub fn read_opt_string(&mut self) -> Result<Option<String>> {
        match self.read_opt_blob_slice()? {
            None => Ok(None),
            Some(bytes) => std::str::from_utf8(bytes)
                .map(|s| Some(s.to_string()))
                .map_err(|_| Error::InvalidUtf8),
        }
    }

    /// Read a length-prefixed string; null reads as empty
    pub fn read_string(&mut self) -> Result<String> {
        Ok(self.read_opt_string()?.unwrap_or_default())
    }
}

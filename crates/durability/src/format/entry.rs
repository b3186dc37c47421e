//! Entry envelope
//!
//! One file holds one entry:
//!
//! ```text
//! MAGIC "KSVE" (4) | FORMAT_VERSION u32 (4)
//! KEY_LEN i32 + KEY_UTF8
//! TYPE_NAME_LEN i32 + TYPE_NAME_UTF8
//! TYPE_ID i32 (4) | DATA_VERSION u32 (4)
//! PAYLOAD_LEN i32 + PAYLOAD_BYTES
//! ```
//!
//! All integers are little-endian; a length of `-1` is the null sentinel. The
//! type id is a CRC32 fingerprint of the type name, carried for diagnostics
//! only. Compatibility is always decided by the type name.

use keystash_core::{type_fingerprint, BinaryReader, BinaryWriter, Error, Result};

/// Magic bytes at the start of every entry file
pub const ENTRY_MAGIC: [u8; 4] = *b"KSVE";

/// Current entry format version
pub const ENTRY_FORMAT_VERSION: u32 = 1;

/// One persisted record as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPayload {
    /// Key id
    pub key: String,
    /// Wire name of the stored type
    pub type_name: String,
    /// Fingerprint of `type_name`
    pub type_id: i32,
    /// Schema version the payload was written with
    pub data_version: u32,
    /// Serialized value
    pub payload: Vec<u8>,
}

impl EntryPayload {
    /// Build an entry, computing the type fingerprint
    pub fn new(
        key: impl Into<String>,
        type_name: impl Into<String>,
        data_version: u32,
        payload: Vec<u8>,
    ) -> Self {
        let type_name = type_name.into();
        EntryPayload {
            key: key.into(),
            type_id: type_fingerprint(&type_name),
            type_name,
            data_version,
            payload,
        }
    }

    /// Whether the stored fingerprint matches the stored type name
    pub fn fingerprint_matches(&self) -> bool {
        self.type_id == type_fingerprint(&self.type_name)
    }

    /// Encode the envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::with_capacity(
            28 + self.key.len() + self.type_name.len() + self.payload.len(),
        );
        writer.write_magic(ENTRY_MAGIC);
        writer.write_u32(ENTRY_FORMAT_VERSION);
        writer.write_str(&self.key)?;
        writer.write_str(&self.type_name)?;
        writer.write_i32(self.type_id);
        writer.write_u32(self.data_version);
        writer.write_blob(&self.payload)?;
        Ok(writer.into_bytes())
    }

    /// Decode an envelope, validating magic and format version
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let magic = reader.read_magic()?;
        if magic != ENTRY_MAGIC {
            return Err(Error::InvalidMagic {
                expected: ENTRY_MAGIC,
                found: magic,
            });
        }
        let version = reader.read_u32()?;
        if version == 0 || version > ENTRY_FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion {
                found: version,
                supported: ENTRY_FORMAT_VERSION,
            });
        }

        let key = reader
            .read_opt_string()?
            .ok_or_else(|| Error::Corruption("entry has a null key".to_string()))?;
        let type_name = reader
            .read_opt_string()?
            .ok_or_else(|| Error::Corruption(format!("entry '{}' has a null type name", key)))?;
        let type_id = reader.read_i32()?;
        let data_version = reader.read_u32()?;
        let payload = reader.read_opt_blob()?.unwrap_or_default();

        Ok(EntryPayload {
            key,
            type_name,
            type_id,
            data_version,
            payload,
        })
    }
}

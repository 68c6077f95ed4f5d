//! Integrity checks used by the XZ stream layer and available to any codec
//! that wants to verify a block independently of the container around it.

use sha2::Digest;

/// Which integrity check, if any, protects a block's uncompressed data.
/// The numeric values match the XZ format's `Check ID` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    None,
    Crc32,
    Crc64,
    Sha256,
}

impl CheckType {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Crc32),
            0x04 => Some(Self::Crc64),
            0x0A => Some(Self::Sha256),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Crc32 => 0x01,
            Self::Crc64 => 0x04,
            Self::Sha256 => 0x0A,
        }
    }

    /// Size in bytes of the encoded check value, as stored trailing each
    /// XZ block.
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc32 => 4,
            Self::Crc64 => 8,
            Self::Sha256 => 32,
        }
    }

    pub fn digest(self) -> CheckDigest {
        match self {
            Self::None => CheckDigest::None,
            Self::Crc32 => CheckDigest::Crc32(crc32fast::Hasher::new()),
            Self::Crc64 => CheckDigest::Crc64(crc64fast::Digest::new()),
            Self::Sha256 => CheckDigest::Sha256(sha2::Sha256::new()),
        }
    }
}

/// A running checksum computation, selected at runtime by [`CheckType`].
pub enum CheckDigest {
    None,
    Crc32(crc32fast::Hasher),
    Crc64(crc64fast::Digest),
    Sha256(sha2::Sha256),
}

impl CheckDigest {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::Crc32(h) => h.update(data),
            Self::Crc64(h) => h.write(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Finalizes into the encoded on-wire representation (little-endian for
    /// CRC32/CRC64, as XZ stores them).
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::Crc32(h) => h.finalize().to_le_bytes().to_vec(),
            Self::Crc64(h) => h.sum64().to_le_bytes().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

pub fn crc32_ieee(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

pub fn crc64_xz(data: &[u8]) -> u64 {
    let mut d = crc64fast::Digest::new();
    d.write(data);
    d.sum64()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(data).into()
}

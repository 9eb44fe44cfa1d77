//! Native `.forest` artifact format.
//!
//! A 32-byte header followed by a Postcard-encoded payload.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Header (32 bytes)                        │
//! ├────────────────────────────────────────────────────────────┤
//! │                    Payload (variable)                       │
//! └────────────────────────────────────────────────────────────┘
//! ```

use std::io::{Read, Write};

use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying a maize-yield artifact.
pub const MAGIC: &[u8; 4] = b"MZYF";

/// Current format version (major).
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Format Flags
// ============================================================================

/// Bitfield flags for format features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Model was produced by the built-in demo trainer.
    pub const DEMO: u16 = 1 << 0;

    /// Every flag this version defines.
    pub const KNOWN: u16 = Self::DEMO;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u16) {
        self.0 &= !flag;
    }
}

// ============================================================================
// Format Header
// ============================================================================

/// 32-byte header of an artifact.
///
/// # Layout
///
/// | Offset | Size | Field          |
/// |--------|------|----------------|
/// | 0      | 4    | magic `MZYF`   |
/// | 4      | 1    | version major  |
/// | 5      | 1    | version minor  |
/// | 6      | 2    | reserved       |
/// | 8      | 2    | flags (LE)     |
/// | 10     | 2    | reserved       |
/// | 12     | 4    | payload size   |
/// | 16     | 4    | CRC32 payload  |
/// | 20     | 4    | feature count  |
/// | 24     | 8    | reserved       |
///
/// Reserved bytes must be zero and only flags in [`FormatFlags::KNOWN`] may
/// be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: FormatFlags,
    pub payload_size: u32,
    pub checksum: u32,
    pub n_features: u32,
}

impl FormatHeader {
    /// Header for the current version; size and checksum are filled on write.
    pub fn new(n_features: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            flags: FormatFlags::empty(),
            payload_size: 0,
            checksum: 0,
            n_features,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[8..10].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..24].copy_from_slice(&self.n_features.to_le_bytes());

        buf
    }

    /// Parse and check magic, version, flags and reserved bytes.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAModel);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major != CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let flags = FormatFlags::from_bits(u16::from_le_bytes([buf[8], buf[9]]));
        let unknown = flags.bits() & !FormatFlags::KNOWN;
        if unknown != 0 {
            return Err(DeserializeError::UnknownFlags(unknown));
        }

        let reserved = buf[6..8].iter().chain(&buf[10..12]).chain(&buf[24..32]);
        if reserved.copied().any(|b| b != 0) {
            return Err(DeserializeError::ReservedBytes);
        }

        let le_u32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            version_major,
            version_minor,
            flags,
            payload_size: le_u32(12),
            checksum: le_u32(16),
            n_features: le_u32(20),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("payload of {0} bytes exceeds the format limit")]
    TooLarge(usize),
}

/// Errors that can occur during deserialization.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a maize-yield model file")]
    NotAModel,

    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("unknown header flags {0:#06x}")]
    UnknownFlags(u16),

    #[error("reserved header bytes are not zero")]
    ReservedBytes,

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),
}

/// CRC32 of the payload bytes.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// Codec
// ============================================================================

/// Reads and writes header + payload pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }

    /// Write header and payload. Fills in the header's size and checksum.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut FormatHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        header.payload_size =
            u32::try_from(payload.len()).map_err(|_| SerializeError::TooLarge(payload.len()))?;
        header.checksum = compute_checksum(payload);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(payload)?;
        Ok(())
    }

    /// Read header and payload, verifying the checksum.
    pub fn read_from<R: Read>(
        &self,
        reader: &mut R,
    ) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
        let mut header_buf = [0u8; HEADER_SIZE];
        let got = read_full(reader, &mut header_buf)?;
        if got < HEADER_SIZE {
            return Err(DeserializeError::Truncated { expected: HEADER_SIZE, actual: got });
        }

        let header = FormatHeader::from_bytes(&header_buf)?;

        // grows with the bytes actually present, not the declared size
        let expected = header.payload_size as usize;
        let mut payload = Vec::new();
        reader.by_ref().take(u64::from(header.payload_size)).read_to_end(&mut payload)?;
        if payload.len() < expected {
            return Err(DeserializeError::Truncated { expected, actual: payload.len() });
        }

        let actual_checksum = compute_checksum(&payload);
        if actual_checksum != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual: actual_checksum,
            });
        }

        Ok((header, payload))
    }

    /// Encode `payload` with Postcard and prepend a header.
    pub fn serialize<T: serde::Serialize>(
        &self,
        mut header: FormatHeader,
        payload: &T,
    ) -> Result<Vec<u8>, SerializeError> {
        let payload_bytes = postcard::to_allocvec(payload)?;
        let mut output = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
        self.write_to(&mut output, &mut header, &payload_bytes)?;
        Ok(output)
    }

    /// Decode a complete artifact from bytes.
    pub fn deserialize<T: for<'de> serde::Deserialize<'de>>(
        &self,
        bytes: &[u8],
    ) -> Result<(FormatHeader, T), DeserializeError> {
        let mut cursor = bytes;
        let (header, payload_bytes) = self.read_from(&mut cursor)?;
        let payload = postcard::from_bytes(&payload_bytes)?;
        Ok((header, payload))
    }
}

/// Fill `buf` as far as the reader allows, returning the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut header = FormatHeader::new(8);
        let mut buffer = Vec::new();
        NativeCodec::new().write_to(&mut buffer, &mut header, payload).unwrap();
        buffer
    }

    #[test]
    fn header_roundtrip() {
        let header = FormatHeader {
            version_major: 1,
            version_minor: 2,
            flags: FormatFlags::from_bits(FormatFlags::DEMO),
            payload_size: 12345,
            checksum: 0xDEADBEEF,
            n_features: 8,
        };

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"MZYF");
        assert_eq!(FormatHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn header_wrong_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"BSTR");
        assert!(matches!(FormatHeader::from_bytes(&buf), Err(DeserializeError::NotAModel)));
    }

    #[test]
    fn header_unsupported_version() {
        let mut header = FormatHeader::new(8);
        header.version_major = 99;
        let result = FormatHeader::from_bytes(&header.to_bytes());
        assert!(matches!(
            result,
            Err(DeserializeError::UnsupportedVersion { major: 99, .. })
        ));
    }

    #[test]
    fn codec_write_read() {
        let buffer = framed(b"forest bytes");
        assert_eq!(buffer.len(), HEADER_SIZE + 12);

        let (header, payload) = NativeCodec::new().read_from(&mut buffer.as_slice()).unwrap();
        assert_eq!(header.n_features, 8);
        assert_eq!(header.payload_size, 12);
        assert_eq!(payload, b"forest bytes");
    }

    #[test]
    fn codec_detects_corruption() {
        let mut buffer = framed(b"some model data");
        buffer[HEADER_SIZE + 5] ^= 0xFF;

        let result = NativeCodec::new().read_from(&mut buffer.as_slice());
        assert!(matches!(result, Err(DeserializeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn codec_detects_truncation() {
        let buffer = framed(b"some model data");

        let short_payload = &buffer[..buffer.len() - 3];
        let result = NativeCodec::new().read_from(&mut &short_payload[..]);
        assert!(matches!(
            result,
            Err(DeserializeError::Truncated { expected: 15, actual: 12 })
        ));

        let short_header = &buffer[..10];
        let result = NativeCodec::new().read_from(&mut &short_header[..]);
        assert!(matches!(
            result,
            Err(DeserializeError::Truncated { expected: HEADER_SIZE, actual: 10 })
        ));
    }

    #[test]
    fn oversized_declared_payload_is_truncation() {
        let mut buffer = framed(b"tiny");
        buffer[12..16].copy_from_slice(&u32::MAX.to_le_bytes());

        let result = NativeCodec::new().deserialize::<Vec<u8>>(&buffer);
        assert!(matches!(
            result,
            Err(DeserializeError::Truncated { expected, actual: 4 }) if expected == u32::MAX as usize
        ));
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        let mut buffer = framed(b"payload");
        buffer[9] = 0xFF;
        let result = NativeCodec::new().read_from(&mut buffer.as_slice());
        assert!(matches!(result, Err(DeserializeError::UnknownFlags(0xFF00))));

        let mut header = FormatHeader::new(8);
        header.flags = FormatFlags::from_bits(1 << 3);
        assert!(matches!(
            FormatHeader::from_bytes(&header.to_bytes()),
            Err(DeserializeError::UnknownFlags(0x0008))
        ));
    }

    #[test]
    fn nonzero_reserved_bytes_are_rejected() {
        for idx in [6, 7, 10, 11, 24, 30, 31] {
            let mut bytes = FormatHeader::new(8).to_bytes();
            bytes[idx] = 7;
            assert!(
                matches!(FormatHeader::from_bytes(&bytes), Err(DeserializeError::ReservedBytes)),
                "byte {idx}"
            );
        }
    }

    #[test]
    fn serialize_postcard_values() {
        let codec = NativeCodec::new();
        let bytes = codec.serialize(FormatHeader::new(3), &vec![1.5f64, -2.0]).unwrap();
        let (header, values): (_, Vec<f64>) = codec.deserialize(&bytes).unwrap();
        assert_eq!(header.n_features, 3);
        assert_eq!(values, vec![1.5, -2.0]);
    }

    #[test]
    fn flags_operations() {
        let mut flags = FormatFlags::empty();
        assert!(!flags.contains(FormatFlags::DEMO));
        flags.set(FormatFlags::DEMO);
        assert!(flags.contains(FormatFlags::DEMO));
        flags.clear(FormatFlags::DEMO);
        assert_eq!(flags.bits(), 0);
    }
}

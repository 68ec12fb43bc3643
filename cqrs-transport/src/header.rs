//! Fixed-size message header.
//!
//! Layout (big-endian):
//!
//! | offset | size | field               |
//! |--------|------|---------------------|
//! | 0      | 4    | format version      |
//! | 4      | 8    | attributes length   |
//! | 12     | 8    | content length      |
//!
//! The header is written last on encode, once both lengths are known, and
//! read first on decode.

use crate::error::{TransportError, TransportResult};

/// Format tag of the only supported data schema.
pub const SCHEMA2_DATA_FORMAT: u32 = 0x0000_0002;

const HEADER_SIZE: usize = 20;

/// Header of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub format_version: u32,
    /// Byte length of the envelope-contract region after the header.
    pub attributes_length: u64,
    /// Total byte length of the item content blocks.
    pub content_length: u64,
}

impl MessageHeader {
    pub const FIXED_SIZE: usize = HEADER_SIZE;

    #[must_use]
    pub const fn for_schema2_data(attributes_length: u64, content_length: u64) -> Self {
        Self {
            format_version: SCHEMA2_DATA_FORMAT,
            attributes_length,
            content_length,
        }
    }

    /// Writes the header into the first [`Self::FIXED_SIZE`] bytes of `out`.
    pub fn write_to(&self, out: &mut [u8]) -> TransportResult<()> {
        if out.len() < Self::FIXED_SIZE {
            return Err(TransportError::Truncated {
                need: Self::FIXED_SIZE as u64,
                have: out.len() as u64,
            });
        }
        out[0..4].copy_from_slice(&self.format_version.to_be_bytes());
        out[4..12].copy_from_slice(&self.attributes_length.to_be_bytes());
        out[12..20].copy_from_slice(&self.content_length.to_be_bytes());
        Ok(())
    }

    /// Parses the header at offset 0 and checks the format tag.
    pub fn read_from(buffer: &[u8]) -> TransportResult<Self> {
        let Some(raw) = buffer.first_chunk::<HEADER_SIZE>() else {
            return Err(TransportError::Truncated {
                need: Self::FIXED_SIZE as u64,
                have: buffer.len() as u64,
            });
        };

        let mut version = [0u8; 4];
        let mut attributes = [0u8; 8];
        let mut content = [0u8; 8];
        version.copy_from_slice(&raw[0..4]);
        attributes.copy_from_slice(&raw[4..12]);
        content.copy_from_slice(&raw[12..20]);

        let format_version = u32::from_be_bytes(version);
        if format_version != SCHEMA2_DATA_FORMAT {
            return Err(TransportError::UnsupportedFormat {
                found: format_version,
                expected: SCHEMA2_DATA_FORMAT,
            });
        }

        Ok(Self {
            format_version,
            attributes_length: u64::from_be_bytes(attributes),
            content_length: u64::from_be_bytes(content),
        })
    }

    /// Total buffer length this header describes.
    #[must_use]
    pub fn total_length(&self) -> u64 {
        (Self::FIXED_SIZE as u64)
            .saturating_add(self.attributes_length)
            .saturating_add(self.content_length)
    }
}

//! Page body compression codecs

use crate::{Result, StrataError};
use bytes::Bytes;

/// Compression codec of a chunk's pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    /// Page bodies stored raw
    Uncompressed,
    /// LZ4 with a size-prepended frame
    #[default]
    Lz4,
}

impl CompressionType {
    /// Wire code of this codec
    pub fn code(&self) -> u8 {
        match self {
            CompressionType::Uncompressed => 0,
            CompressionType::Lz4 => 1,
        }
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(CompressionType::Uncompressed),
            1 => Ok(CompressionType::Lz4),
            _ => Err(StrataError::CorruptChunk(format!(
                "unknown compression code: {}",
                code
            ))),
        }
    }

    /// Compress a page body
    pub fn compress(&self, body: &[u8]) -> Vec<u8> {
        match self {
            CompressionType::Uncompressed => body.to_vec(),
            CompressionType::Lz4 => lz4_flex::compress_prepend_size(body),
        }
    }

    /// Decompress a page body; `uncompressed_size` comes from the page
    /// header and is verified against the produced bytes.
    pub fn decompress(&self, body: &[u8], uncompressed_size: usize) -> Result<Bytes> {
        let raw = match self {
            CompressionType::Uncompressed => body.to_vec(),
            CompressionType::Lz4 => lz4_flex::decompress_size_prepended(body)
                .map_err(|e| StrataError::Compression(e.to_string()))?,
        };
        if raw.len() != uncompressed_size {
            return Err(StrataError::CorruptChunk(format!(
                "page decompressed to {} bytes, header says {}",
                raw.len(),
                uncompressed_size
            )));
        }
        Ok(Bytes::from(raw))
    }
}

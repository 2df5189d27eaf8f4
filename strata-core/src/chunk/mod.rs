//! On-disk chunk layout: header, pages, and the in-memory chunk view
//!
//! A chunk is a marker byte, a header, and a run of pages. Each page is a
//! header followed by a compressed body holding the encoded time and
//! value columns. Structural integers are little-endian; the header's
//! endianness byte governs PLAIN page payloads.

mod metadata;
mod page;
mod reader;
mod writer;

pub use metadata::ChunkMetaData;
pub use page::PageReader;
pub use reader::{ChunkReader, ChunkReaderVariant};
pub use writer::{ChunkWriter, SealedChunk};

use crate::compression::CompressionType;
use crate::encoding::Encoding;
use crate::statistics::Statistics;
use crate::types::{DataType, Endianness, Timestamp};
use crate::{Result, StrataError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Read;

/// Marker byte opening every chunk
pub const CHUNK_HEADER_MARKER: u8 = 0x01;

/// Header of one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHeader {
    /// Measurement id, the final segment of the series path
    pub measurement_uid: String,
    /// Byte length of the page run following the header
    pub body_size: u32,
    /// Number of pages in the body
    pub num_pages: u32,
    pub compression: CompressionType,
    pub encoding: Encoding,
    pub data_type: DataType,
    pub endianness: Endianness,
}

impl ChunkHeader {
    /// Serialized length in bytes, marker included
    pub fn serialized_size(&self) -> usize {
        1 + 4 + self.measurement_uid.len() + 4 + 4 + 4
    }

    /// Serialize, marker first
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(CHUNK_HEADER_MARKER);
        buf.put_i32_le(self.measurement_uid.len() as i32);
        buf.put_slice(self.measurement_uid.as_bytes());
        buf.put_i32_le(self.body_size as i32);
        buf.put_i32_le(self.num_pages as i32);
        buf.put_u8(self.compression.code());
        buf.put_u8(self.encoding.code());
        buf.put_u8(self.data_type.code());
        buf.put_u8(self.endianness.code());
    }

    /// Deserialize from a buffer positioned at the marker
    pub fn deserialize(buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < 5 {
            return Err(StrataError::CorruptChunk("chunk header truncated".into()));
        }
        let marker = buf.get_u8();
        if marker != CHUNK_HEADER_MARKER {
            return Err(StrataError::CorruptChunk(format!(
                "unknown chunk marker: {:#04x}",
                marker
            )));
        }
        let uid_len = buf.get_i32_le();
        if uid_len < 0 || buf.remaining() < uid_len as usize + 12 {
            return Err(StrataError::CorruptChunk("chunk header truncated".into()));
        }
        let uid_raw = buf.copy_to_bytes(uid_len as usize);
        let measurement_uid = String::from_utf8(uid_raw.to_vec())
            .map_err(|e| StrataError::CorruptChunk(format!("invalid measurement uid: {}", e)))?;
        let body_size = buf.get_i32_le();
        let num_pages = buf.get_i32_le();
        if body_size < 0 || num_pages < 0 {
            return Err(StrataError::CorruptChunk("negative chunk size field".into()));
        }
        Ok(Self {
            measurement_uid,
            body_size: body_size as u32,
            num_pages: num_pages as u32,
            compression: CompressionType::from_code(buf.get_u8())?,
            encoding: Encoding::from_code(buf.get_u8())?,
            data_type: DataType::from_code(buf.get_u8())?,
            endianness: Endianness::from_code(buf.get_u8())?,
        })
    }

    /// Read from a positioned stream, marker first
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; 5];
        reader.read_exact(&mut fixed)?;
        let marker = fixed[0];
        if marker != CHUNK_HEADER_MARKER {
            return Err(StrataError::CorruptChunk(format!(
                "unknown chunk marker: {:#04x}",
                marker
            )));
        }
        let uid_len = i32::from_le_bytes([fixed[1], fixed[2], fixed[3], fixed[4]]);
        if uid_len < 0 {
            return Err(StrataError::CorruptChunk("negative measurement uid length".into()));
        }
        let mut rest = vec![0u8; uid_len as usize + 12];
        reader.read_exact(&mut rest)?;
        let mut buf = BytesMut::with_capacity(5 + rest.len());
        buf.put_slice(&fixed);
        buf.put_slice(&rest);
        Self::deserialize(&mut buf.freeze())
    }
}

/// Header of one page inside a chunk
#[derive(Debug, Clone, PartialEq)]
pub struct PageHeader {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub statistics: Statistics,
    pub num_points: u32,
    pub max_timestamp: Timestamp,
    pub min_timestamp: Timestamp,
}

impl PageHeader {
    /// First timestamp covered by the page
    pub fn start_time(&self) -> Timestamp {
        self.min_timestamp
    }

    /// Last timestamp covered by the page
    pub fn end_time(&self) -> Timestamp {
        self.max_timestamp
    }

    /// Serialize in wire order
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.uncompressed_size as i32);
        buf.put_i32_le(self.compressed_size as i32);
        self.statistics.serialize(buf);
        buf.put_i32_le(self.num_points as i32);
        buf.put_i64_le(self.max_timestamp);
        buf.put_i64_le(self.min_timestamp);
    }

    /// Deserialize; the statistics count is restored from `num_points`
    pub fn deserialize(buf: &mut Bytes, data_type: DataType) -> Result<Self> {
        if buf.remaining() < 8 {
            return Err(StrataError::CorruptChunk("page header truncated".into()));
        }
        let uncompressed_size = buf.get_i32_le();
        let compressed_size = buf.get_i32_le();
        if uncompressed_size < 0 || compressed_size < 0 {
            return Err(StrataError::CorruptChunk("negative page size field".into()));
        }
        let mut statistics = Statistics::deserialize(buf, data_type)?;
        if buf.remaining() < 20 {
            return Err(StrataError::CorruptChunk("page header truncated".into()));
        }
        let num_points = buf.get_i32_le();
        if num_points < 0 {
            return Err(StrataError::CorruptChunk("negative page point count".into()));
        }
        statistics.set_count(num_points as u64);
        let max_timestamp = buf.get_i64_le();
        let min_timestamp = buf.get_i64_le();
        Ok(Self {
            uncompressed_size: uncompressed_size as u32,
            compressed_size: compressed_size as u32,
            statistics,
            num_points: num_points as u32,
            max_timestamp,
            min_timestamp,
        })
    }
}

/// One chunk materialized in memory, ready for a reader
#[derive(Debug, Clone)]
pub struct Chunk {
    pub header: ChunkHeader,
    /// The page run (headers + compressed bodies)
    pub data: Bytes,
    /// Deletion watermark stamped from the per-query chunk metadata
    pub deleted_at: Timestamp,
    pub endianness: Endianness,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TsValue;

    #[test]
    fn test_chunk_header_roundtrip() {
        let header = ChunkHeader {
            measurement_uid: "temperature".into(),
            body_size: 512,
            num_pages: 3,
            compression: CompressionType::Lz4,
            encoding: Encoding::Gorilla,
            data_type: DataType::Double,
            endianness: Endianness::Little,
        };
        let mut buf = BytesMut::new();
        header.serialize(&mut buf);
        assert_eq!(buf.len(), header.serialized_size());
        let restored = ChunkHeader::deserialize(&mut buf.freeze()).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn test_chunk_header_bad_marker() {
        let mut buf = BytesMut::new();
        let header = ChunkHeader {
            measurement_uid: "m".into(),
            body_size: 0,
            num_pages: 0,
            compression: CompressionType::Uncompressed,
            encoding: Encoding::Plain,
            data_type: DataType::Int32,
            endianness: Endianness::Little,
        };
        header.serialize(&mut buf);
        buf[0] = 0x7f;
        let err = ChunkHeader::deserialize(&mut buf.freeze()).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_page_header_roundtrip() {
        let mut statistics = Statistics::new(DataType::Double);
        statistics.update(1, &TsValue::Double(1.5)).unwrap();
        statistics.update(9, &TsValue::Double(-2.0)).unwrap();
        let header = PageHeader {
            uncompressed_size: 100,
            compressed_size: 60,
            statistics,
            num_points: 2,
            max_timestamp: 9,
            min_timestamp: 1,
        };
        let mut buf = BytesMut::new();
        header.serialize(&mut buf);
        let restored = PageHeader::deserialize(&mut buf.freeze(), DataType::Double).unwrap();
        assert_eq!(restored, header);
        assert_eq!(restored.statistics.count(), 2);
    }

    #[test]
    fn test_chunk_header_read_from_stream() {
        let header = ChunkHeader {
            measurement_uid: "sensor".into(),
            body_size: 99,
            num_pages: 1,
            compression: CompressionType::Uncompressed,
            encoding: Encoding::TwoDiff,
            data_type: DataType::Int64,
            endianness: Endianness::Big,
        };
        let mut buf = BytesMut::new();
        header.serialize(&mut buf);
        let bytes = buf.freeze();
        let mut cursor = std::io::Cursor::new(bytes.to_vec());
        let restored = ChunkHeader::read_from(&mut cursor).unwrap();
        assert_eq!(restored, header);
    }
}

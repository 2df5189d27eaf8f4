//! Page iteration over one chunk

use super::{Chunk, ChunkHeader, PageHeader, PageReader};
use crate::config;
use crate::encoding::{decoder_for, Decoder};
use crate::filter::Filter;
use crate::read::BatchData;
use crate::types::{DataType, Endianness, Timestamp};
use crate::{Result, StrataError};
use bytes::{Buf, Bytes};

/// Page acceptance mode of a chunk reader
#[derive(Debug, Clone)]
pub enum ChunkReaderVariant {
    /// Filtered scan: pages pruned by header statistics and the
    /// deletion watermark
    Scan { filter: Option<Filter> },
    /// Point lookup: pages pruned by `end_time >= current_timestamp`
    ByTimestamp { current_timestamp: Timestamp },
}

/// Iterates the satisfying pages of one chunk, producing one batch per
/// page. Rejected pages are skipped without decompression.
pub struct ChunkReader {
    header: ChunkHeader,
    data: Bytes,
    deleted_at: Timestamp,
    endianness: Endianness,
    time_decoder: Box<dyn Decoder>,
    value_decoder: Box<dyn Decoder>,
    variant: ChunkReaderVariant,
    cached_header: Option<PageHeader>,
}

impl ChunkReader {
    /// Create a filtered-scan reader
    pub fn new(chunk: Chunk, filter: Option<Filter>) -> Result<Self> {
        Self::with_variant(chunk, ChunkReaderVariant::Scan { filter })
    }

    /// Create a point-lookup reader
    pub fn new_by_timestamp(chunk: Chunk) -> Result<Self> {
        Self::with_variant(
            chunk,
            ChunkReaderVariant::ByTimestamp {
                current_timestamp: i64::MIN,
            },
        )
    }

    fn with_variant(chunk: Chunk, variant: ChunkReaderVariant) -> Result<Self> {
        let mut time_decoder =
            decoder_for(config::TIME_ENCODING, DataType::Int64, chunk.endianness)?;
        let mut value_decoder = decoder_for(
            chunk.header.encoding,
            chunk.header.data_type,
            chunk.endianness,
        )?;
        time_decoder.set_endianness(chunk.endianness);
        value_decoder.set_endianness(chunk.endianness);
        Ok(Self {
            header: chunk.header,
            data: chunk.data,
            deleted_at: chunk.deleted_at,
            endianness: chunk.endianness,
            time_decoder,
            value_decoder,
            variant,
            cached_header: None,
        })
    }

    /// Chunk header
    pub fn chunk_header(&self) -> &ChunkHeader {
        &self.header
    }

    /// Data type of the value column
    pub fn data_type(&self) -> DataType {
        self.header.data_type
    }

    /// Propagate the lookup timestamp; only meaningful for the
    /// point-lookup variant
    pub fn set_current_timestamp(&mut self, ts: Timestamp) {
        if let ChunkReaderVariant::ByTimestamp { current_timestamp } = &mut self.variant {
            *current_timestamp = ts;
        }
    }

    fn page_satisfied(&self, header: &PageHeader) -> bool {
        match &self.variant {
            ChunkReaderVariant::Scan { filter } => {
                if header.end_time() <= self.deleted_at {
                    return false;
                }
                match filter {
                    Some(f) => {
                        f.accepts_stats(&header.statistics, header.start_time(), header.end_time())
                    }
                    None => true,
                }
            }
            ChunkReaderVariant::ByTimestamp { current_timestamp } => {
                header.end_time() >= *current_timestamp
            }
        }
    }

    /// Position on the next satisfying page, if any
    pub fn has_next_batch(&mut self) -> Result<bool> {
        if self.cached_header.is_some() {
            return Ok(true);
        }
        while self.data.has_remaining() {
            let header = PageHeader::deserialize(&mut self.data, self.header.data_type)?;
            let size = header.compressed_size as usize;
            if size > self.data.remaining() {
                return Err(StrataError::CorruptChunk(format!(
                    "page body of {} bytes exceeds remaining {} chunk bytes",
                    size,
                    self.data.remaining()
                )));
            }
            if self.page_satisfied(&header) {
                self.cached_header = Some(header);
                return Ok(true);
            }
            self.data.advance(size);
        }
        Ok(false)
    }

    /// Decompress and decode the positioned page into a batch; the batch
    /// may be empty after point-level filtering
    pub fn next_batch(&mut self) -> Result<BatchData> {
        if self.cached_header.is_none() && !self.has_next_batch()? {
            return Ok(BatchData::new(self.header.data_type));
        }
        let page_header = self
            .cached_header
            .take()
            .expect("has_next_batch positioned a page");

        let compressed = self
            .data
            .copy_to_bytes(page_header.compressed_size as usize);
        let body = self
            .header
            .compression
            .decompress(&compressed, page_header.uncompressed_size as usize)?;

        self.time_decoder.reset();
        self.value_decoder.reset();
        self.time_decoder.set_endianness(self.endianness);
        self.value_decoder.set_endianness(self.endianness);

        let filter = match &self.variant {
            ChunkReaderVariant::Scan { filter } => filter.as_ref(),
            ChunkReaderVariant::ByTimestamp { .. } => None,
        };
        let mut page_reader = PageReader::new(
            body,
            self.header.data_type,
            self.time_decoder.as_mut(),
            self.value_decoder.as_mut(),
            filter,
            self.deleted_at,
        )?;
        page_reader.next_batch()
    }

    /// Release buffers; further batches are never produced
    pub fn close(&mut self) {
        self.data = Bytes::new();
        self.cached_header = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkWriter, SealedChunk};
    use crate::compression::CompressionType;
    use crate::encoding::Encoding;
    use crate::types::TsValue;

    fn sealed_chunk(points: &[(i64, f64)], page_points: usize) -> SealedChunk {
        let mut writer = ChunkWriter::new(
            "sensor",
            DataType::Double,
            Encoding::Gorilla,
            CompressionType::Lz4,
            Endianness::Little,
            page_points,
        )
        .unwrap();
        for (ts, v) in points {
            writer.write(*ts, &TsValue::Double(*v)).unwrap();
        }
        writer.finish().unwrap()
    }

    fn chunk_of(sealed: &SealedChunk, deleted_at: i64) -> Chunk {
        Chunk {
            header: sealed.header.clone(),
            data: sealed.body.clone(),
            deleted_at,
            endianness: Endianness::Little,
        }
    }

    fn drain(reader: &mut ChunkReader) -> Vec<(i64, f64)> {
        let mut out = Vec::new();
        while reader.has_next_batch().unwrap() {
            let mut batch = reader.next_batch().unwrap();
            while batch.has_next() {
                match batch.current_value() {
                    TsValue::Double(v) => out.push((batch.current_time(), v)),
                    other => panic!("unexpected value {:?}", other),
                }
                batch.advance();
            }
        }
        out
    }

    #[test]
    fn test_scan_all_pages() {
        let points: Vec<(i64, f64)> = (1..=10).map(|i| (i, i as f64)).collect();
        let sealed = sealed_chunk(&points, 4);
        assert_eq!(sealed.header.num_pages, 3);
        let mut reader = ChunkReader::new(chunk_of(&sealed, i64::MIN), None).unwrap();
        assert_eq!(drain(&mut reader), points);
    }

    #[test]
    fn test_scan_prunes_pages_by_time_filter() {
        let points: Vec<(i64, f64)> = (1..=100).map(|i| (i, i as f64)).collect();
        let sealed = sealed_chunk(&points, 10);
        let filter = Filter::TimeGt(50);
        let mut reader = ChunkReader::new(chunk_of(&sealed, i64::MIN), Some(filter)).unwrap();
        let expected: Vec<(i64, f64)> = (51..=100).map(|i| (i, i as f64)).collect();
        assert_eq!(drain(&mut reader), expected);
    }

    #[test]
    fn test_deletion_watermark_prunes_whole_pages() {
        let points: Vec<(i64, f64)> = (1..=20).map(|i| (i, i as f64)).collect();
        let sealed = sealed_chunk(&points, 5);
        let mut reader = ChunkReader::new(chunk_of(&sealed, 10), None).unwrap();
        let expected: Vec<(i64, f64)> = (11..=20).map(|i| (i, i as f64)).collect();
        assert_eq!(drain(&mut reader), expected);
    }

    #[test]
    fn test_zero_satisfying_pages() {
        let points: Vec<(i64, f64)> = (1..=10).map(|i| (i, i as f64)).collect();
        let sealed = sealed_chunk(&points, 5);
        let filter = Filter::TimeGt(1000);
        let mut reader = ChunkReader::new(chunk_of(&sealed, i64::MIN), Some(filter)).unwrap();
        assert!(!reader.has_next_batch().unwrap());
        assert!(reader.next_batch().unwrap().is_empty());
    }

    #[test]
    fn test_by_timestamp_skips_earlier_pages() {
        let points: Vec<(i64, f64)> = (1..=30).map(|i| (i, i as f64)).collect();
        let sealed = sealed_chunk(&points, 10);
        let mut reader = ChunkReader::new_by_timestamp(chunk_of(&sealed, i64::MIN)).unwrap();
        reader.set_current_timestamp(25);
        // first two pages end at 10 and 20, both below the lookup time
        assert!(reader.has_next_batch().unwrap());
        let batch = reader.next_batch().unwrap();
        assert_eq!(batch.times()[0], 21);
    }

    #[test]
    fn test_oversized_page_is_corrupt() {
        let points: Vec<(i64, f64)> = (1..=4).map(|i| (i, i as f64)).collect();
        let sealed = sealed_chunk(&points, 4);
        let mut truncated = sealed.body.clone();
        truncated.truncate(truncated.len() - 3);
        let chunk = Chunk {
            header: sealed.header.clone(),
            data: truncated,
            deleted_at: i64::MIN,
            endianness: Endianness::Little,
        };
        let mut reader = ChunkReader::new(chunk, None).unwrap();
        let err = reader.has_next_batch().unwrap_err();
        assert!(err.is_corruption());
    }
}

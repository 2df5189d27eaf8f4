//! Chunk and page construction

use super::{ChunkHeader, PageHeader};
use crate::compression::CompressionType;
use crate::config;
use crate::encoding::{encoder_for, Encoder, Encoding};
use crate::statistics::Statistics;
use crate::types::{DataType, Endianness, Timestamp, TsValue};
use crate::{Result, StrataError};
use bytes::{BufMut, Bytes, BytesMut};

/// A fully built chunk: header, page run, and summary
#[derive(Debug, Clone)]
pub struct SealedChunk {
    pub header: ChunkHeader,
    /// Serialized page run (page headers + compressed bodies)
    pub body: Bytes,
    pub statistics: Statistics,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub num_points: u64,
}

/// Accumulates one page's columns
struct PageWriter {
    time_encoder: Box<dyn Encoder>,
    value_encoder: Box<dyn Encoder>,
    time_buf: BytesMut,
    value_buf: BytesMut,
    statistics: Statistics,
    min_timestamp: Timestamp,
    max_timestamp: Timestamp,
    num_points: u32,
}

impl PageWriter {
    fn new(encoding: Encoding, data_type: DataType, endianness: Endianness) -> Result<Self> {
        Ok(Self {
            time_encoder: encoder_for(config::TIME_ENCODING, DataType::Int64, endianness)?,
            value_encoder: encoder_for(encoding, data_type, endianness)?,
            time_buf: BytesMut::new(),
            value_buf: BytesMut::new(),
            statistics: Statistics::new(data_type),
            min_timestamp: i64::MAX,
            max_timestamp: i64::MIN,
            num_points: 0,
        })
    }

    fn write(&mut self, ts: Timestamp, value: &TsValue) -> Result<()> {
        self.time_encoder
            .encode(&TsValue::Int64(ts), &mut self.time_buf)?;
        self.value_encoder.encode(value, &mut self.value_buf)?;
        self.statistics.update(ts, value)?;
        self.min_timestamp = self.min_timestamp.min(ts);
        self.max_timestamp = ts;
        self.num_points += 1;
        Ok(())
    }

    fn seal(&mut self, compression: CompressionType) -> Result<(PageHeader, Vec<u8>)> {
        self.time_encoder.flush(&mut self.time_buf)?;
        self.value_encoder.flush(&mut self.value_buf)?;

        let mut body = BytesMut::with_capacity(4 + self.time_buf.len() + self.value_buf.len());
        body.put_i32_le(self.time_buf.len() as i32);
        body.put_slice(&self.time_buf);
        body.put_slice(&self.value_buf);
        let compressed = compression.compress(&body);

        let header = PageHeader {
            uncompressed_size: body.len() as u32,
            compressed_size: compressed.len() as u32,
            statistics: self.statistics.clone(),
            num_points: self.num_points,
            max_timestamp: self.max_timestamp,
            min_timestamp: self.min_timestamp,
        };
        Ok((header, compressed))
    }
}

/// Builds one chunk as a sequence of sealed pages
pub struct ChunkWriter {
    measurement_uid: String,
    data_type: DataType,
    encoding: Encoding,
    compression: CompressionType,
    endianness: Endianness,
    max_page_points: usize,

    page: PageWriter,
    pages: BytesMut,
    num_pages: u32,
    statistics: Statistics,
    start_time: Timestamp,
    end_time: Timestamp,
    num_points: u64,
}

impl ChunkWriter {
    /// Create a writer; pages seal automatically at `max_page_points`
    pub fn new(
        measurement_uid: impl Into<String>,
        data_type: DataType,
        encoding: Encoding,
        compression: CompressionType,
        endianness: Endianness,
        max_page_points: usize,
    ) -> Result<Self> {
        Ok(Self {
            measurement_uid: measurement_uid.into(),
            data_type,
            encoding,
            compression,
            endianness,
            max_page_points: max_page_points.max(1),
            page: PageWriter::new(encoding, data_type, endianness)?,
            pages: BytesMut::new(),
            num_pages: 0,
            statistics: Statistics::new(data_type),
            start_time: i64::MAX,
            end_time: i64::MIN,
            num_points: 0,
        })
    }

    /// Append one point; timestamps must strictly ascend within a chunk
    pub fn write(&mut self, ts: Timestamp, value: &TsValue) -> Result<()> {
        if self.num_points > 0 && ts <= self.end_time {
            return Err(StrataError::InvalidFormat(format!(
                "out-of-order write: {} after {}",
                ts, self.end_time
            )));
        }
        self.page.write(ts, value)?;
        self.start_time = self.start_time.min(ts);
        self.end_time = ts;
        self.num_points += 1;
        if self.page.num_points as usize >= self.max_page_points {
            self.seal_page()?;
        }
        Ok(())
    }

    fn seal_page(&mut self) -> Result<()> {
        let (header, compressed) = self.page.seal(self.compression)?;
        self.statistics.merge(&header.statistics)?;
        let mut header_buf = BytesMut::new();
        header.serialize(&mut header_buf);
        self.pages.put_slice(&header_buf);
        self.pages.put_slice(&compressed);
        self.num_pages += 1;
        self.page = PageWriter::new(self.encoding, self.data_type, self.endianness)?;
        Ok(())
    }

    /// Seal the trailing page and produce the chunk
    pub fn finish(mut self) -> Result<SealedChunk> {
        if self.page.num_points > 0 {
            self.seal_page()?;
        }
        let body = self.pages.freeze();
        let header = ChunkHeader {
            measurement_uid: self.measurement_uid,
            body_size: body.len() as u32,
            num_pages: self.num_pages,
            compression: self.compression,
            encoding: self.encoding,
            data_type: self.data_type,
            endianness: self.endianness,
        };
        Ok(SealedChunk {
            header,
            body,
            statistics: self.statistics,
            start_time: self.start_time,
            end_time: self.end_time,
            num_points: self.num_points,
        })
    }
}

//! File-level writer: chunks, per-series index, CRC-protected footer

use super::FileResource;
use crate::chunk::{ChunkMetaData, SealedChunk};
use crate::types::{SeriesPath, Timestamp};
use crate::Result;
use bytes::{BufMut, BytesMut};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// Magic bytes opening every file
pub const FILE_MAGIC: &[u8; 4] = b"STRA";

/// File format version
pub const FILE_VERSION: u8 = 1;

/// Writes one file: magic, chunk data, index, footer.
///
/// The footer is `i64 index_offset`, `u32 crc32(index)`, magic.
pub struct TsFileWriter {
    path: PathBuf,
    file: BufWriter<File>,
    offset: u64,
    version: u64,
    index: BTreeMap<String, Vec<ChunkMetaData>>,
    start_times: HashMap<String, Timestamp>,
    end_times: HashMap<String, Timestamp>,
}

impl TsFileWriter {
    /// Create the file and write the leading magic
    pub fn new(path: impl Into<PathBuf>, version: u64) -> Result<Self> {
        let path = path.into();
        let mut file = BufWriter::new(File::create(&path)?);
        file.write_all(FILE_MAGIC)?;
        file.write_all(&[FILE_VERSION])?;
        Ok(Self {
            path,
            file,
            offset: (FILE_MAGIC.len() + 1) as u64,
            version,
            index: BTreeMap::new(),
            start_times: HashMap::new(),
            end_times: HashMap::new(),
        })
    }

    /// Append a sealed chunk for one series; the returned metadata lets
    /// an unclosed resource track its flushed prefix
    pub fn write_chunk(&mut self, path: &SeriesPath, sealed: SealedChunk) -> Result<ChunkMetaData> {
        let chunk_offset = self.offset;
        let mut header_buf = BytesMut::new();
        sealed.header.serialize(&mut header_buf);
        self.file.write_all(&header_buf)?;
        self.file.write_all(&sealed.body)?;
        self.offset += (header_buf.len() + sealed.body.len()) as u64;

        let meta = ChunkMetaData::new(
            sealed.header.measurement_uid.clone(),
            sealed.header.data_type,
            chunk_offset,
            sealed.start_time,
            sealed.end_time,
            sealed.num_points,
            sealed.statistics,
        );
        let start = self
            .start_times
            .entry(path.full().to_string())
            .or_insert(i64::MAX);
        *start = (*start).min(sealed.start_time);
        let end = self
            .end_times
            .entry(path.full().to_string())
            .or_insert(i64::MIN);
        *end = (*end).max(sealed.end_time);
        self.index
            .entry(path.full().to_string())
            .or_default()
            .push(meta.clone());
        Ok(meta)
    }

    /// Push buffered chunk bytes to disk without sealing the file
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Write index and footer, close the file, return the closed resource
    pub fn finish(mut self) -> Result<FileResource> {
        let index_offset = self.offset;
        let mut index_buf = BytesMut::new();
        index_buf.put_i32_le(self.index.len() as i32);
        for (series, metas) in &self.index {
            index_buf.put_i32_le(series.len() as i32);
            index_buf.put_slice(series.as_bytes());
            index_buf.put_i32_le(metas.len() as i32);
            for meta in metas {
                meta.serialize(&mut index_buf);
            }
        }
        let crc = crc32fast::hash(&index_buf);
        self.file.write_all(&index_buf)?;

        let mut footer = BytesMut::new();
        footer.put_i64_le(index_offset as i64);
        footer.put_u32_le(crc);
        footer.put_slice(FILE_MAGIC);
        self.file.write_all(&footer)?;
        self.file.flush()?;

        debug!(path = %self.path.display(), series = self.index.len(), "sealed file");
        Ok(FileResource::new_closed(
            self.path,
            self.version,
            self.start_times,
            self.end_times,
        ))
    }
}

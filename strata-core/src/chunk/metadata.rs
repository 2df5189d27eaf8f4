//! Metadata of one chunk

use crate::file::ChunkLoader;
use crate::filter::Filter;
use crate::statistics::Statistics;
use crate::types::{DataType, Timestamp};
use crate::{Result, StrataError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::Arc;

/// Locator and summary of one chunk.
///
/// The on-file part (`measurement_uid` through `statistics`) is immutable
/// once read. `version`, `deleted_at`, `priority` and the loader handle
/// are per-query decorations stamped onto a private copy; the shared
/// catalogue entry is never mutated.
#[derive(Debug, Clone)]
pub struct ChunkMetaData {
    measurement_uid: String,
    /// Byte offset of the chunk marker within its file
    offset: u64,
    num_points: u64,
    start_time: Timestamp,
    end_time: Timestamp,
    data_type: DataType,
    statistics: Statistics,

    version: u64,
    deleted_at: Timestamp,
    priority: u64,
    loader: Option<Arc<ChunkLoader>>,
}

impl ChunkMetaData {
    /// Create metadata for a freshly written chunk
    pub fn new(
        measurement_uid: impl Into<String>,
        data_type: DataType,
        offset: u64,
        start_time: Timestamp,
        end_time: Timestamp,
        num_points: u64,
        statistics: Statistics,
    ) -> Self {
        Self {
            measurement_uid: measurement_uid.into(),
            offset,
            num_points,
            start_time,
            end_time,
            data_type,
            statistics,
            version: 0,
            deleted_at: i64::MIN,
            priority: 0,
            loader: None,
        }
    }

    pub fn measurement_uid(&self) -> &str {
        &self.measurement_uid
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn num_points(&self) -> u64 {
        self.num_points
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Deletion watermark; points with `ts <= deleted_at` are invisible
    pub fn deleted_at(&self) -> Timestamp {
        self.deleted_at
    }

    pub fn set_deleted_at(&mut self, deleted_at: Timestamp) {
        self.deleted_at = deleted_at;
    }

    pub fn priority(&self) -> u64 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: u64) {
        self.priority = priority;
    }

    pub fn loader(&self) -> Option<&Arc<ChunkLoader>> {
        self.loader.as_ref()
    }

    pub fn set_loader(&mut self, loader: Arc<ChunkLoader>) {
        self.loader = Some(loader);
    }

    /// True if the chunk may contain a point satisfying the filter
    pub fn satisfies(&self, filter: Option<&Filter>) -> bool {
        match filter {
            Some(f) => f.accepts_stats(&self.statistics, self.start_time, self.end_time),
            None => true,
        }
    }

    /// True if a timestamp falls under the deletion watermark
    pub fn is_deleted_above(&self, ts: Timestamp) -> bool {
        ts <= self.deleted_at
    }

    /// Serialize the on-file part for the file index
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.measurement_uid.len() as i32);
        buf.put_slice(self.measurement_uid.as_bytes());
        buf.put_i64_le(self.offset as i64);
        buf.put_i64_le(self.num_points as i64);
        buf.put_i64_le(self.start_time);
        buf.put_i64_le(self.end_time);
        buf.put_u8(self.data_type.code());
        self.statistics.serialize(buf);
    }

    /// Deserialize one index entry
    pub fn deserialize(buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(StrataError::InvalidFormat("chunk metadata truncated".into()));
        }
        let uid_len = buf.get_i32_le();
        if uid_len < 0 || buf.remaining() < uid_len as usize + 33 {
            return Err(StrataError::InvalidFormat("chunk metadata truncated".into()));
        }
        let uid_raw = buf.copy_to_bytes(uid_len as usize);
        let measurement_uid = String::from_utf8(uid_raw.to_vec())
            .map_err(|e| StrataError::InvalidFormat(format!("invalid measurement uid: {}", e)))?;
        let offset = buf.get_i64_le();
        let num_points = buf.get_i64_le();
        let start_time = buf.get_i64_le();
        let end_time = buf.get_i64_le();
        if offset < 0 || num_points < 0 {
            return Err(StrataError::InvalidFormat("negative chunk metadata field".into()));
        }
        let data_type = DataType::from_code(buf.get_u8())?;
        let mut statistics = Statistics::deserialize(buf, data_type)?;
        statistics.set_count(num_points as u64);
        Ok(Self {
            measurement_uid,
            offset: offset as u64,
            num_points: num_points as u64,
            start_time,
            end_time,
            data_type,
            statistics,
            version: 0,
            deleted_at: i64::MIN,
            priority: 0,
            loader: None,
        })
    }
}

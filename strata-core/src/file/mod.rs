//! File resources: the read-side view of sequential and unsequential
//! files, closed or still being written

mod cache;
mod loader;
mod reader;
mod writer;

pub use cache::{FileReaderCache, MetadataCache};
pub use loader::ChunkLoader;
pub use reader::TsFileReader;
pub use writer::{TsFileWriter, FILE_MAGIC, FILE_VERSION};

use crate::chunk::ChunkMetaData;
use crate::filter::Filter;
use crate::modification::Modification;
use crate::types::{DataType, SeriesPath, Timestamp, TimeValuePair, TsValue};
use crate::{Result, StrataError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// In-memory tail of an unclosed file for one series.
///
/// Points accumulate sorted; a rewrite of an existing timestamp wins.
#[derive(Debug, Clone)]
pub struct ReadOnlyMemChunk {
    data_type: DataType,
    points: BTreeMap<Timestamp, TsValue>,
}

impl ReadOnlyMemChunk {
    /// Create an empty mem-chunk
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            points: BTreeMap::new(),
        }
    }

    /// Data type of the series
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Record one unflushed point
    pub fn write(&mut self, ts: Timestamp, value: TsValue) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(StrataError::InvalidFormat(format!(
                "mem-chunk of {} cannot hold {}",
                self.data_type,
                value.data_type()
            )));
        }
        self.points.insert(ts, value);
        Ok(())
    }

    /// Number of buffered points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sorted snapshot of the buffered points
    pub fn pairs(&self) -> Vec<TimeValuePair> {
        self.points
            .iter()
            .map(|(ts, v)| TimeValuePair::new(*ts, v.clone()))
            .collect()
    }
}

/// Read-side view of one on-disk file.
///
/// A closed resource is immutable and fully indexed on disk. An unclosed
/// resource carries the metadata of its flushed chunks plus per-series
/// mem-chunks for the unflushed tail.
#[derive(Debug)]
pub struct FileResource {
    path: PathBuf,
    closed: bool,
    version: u64,
    start_times: HashMap<String, Timestamp>,
    end_times: HashMap<String, Timestamp>,
    flushed_metas: HashMap<String, Vec<ChunkMetaData>>,
    mem_chunks: HashMap<String, ReadOnlyMemChunk>,
    modifications: Vec<Modification>,
}

impl FileResource {
    /// View of a closed, immutable file
    pub fn new_closed(
        path: impl Into<PathBuf>,
        version: u64,
        start_times: HashMap<String, Timestamp>,
        end_times: HashMap<String, Timestamp>,
    ) -> Self {
        Self {
            path: path.into(),
            closed: true,
            version,
            start_times,
            end_times,
            flushed_metas: HashMap::new(),
            mem_chunks: HashMap::new(),
            modifications: Vec::new(),
        }
    }

    /// View of a file still being written
    pub fn new_unclosed(path: impl Into<PathBuf>, version: u64) -> Self {
        Self {
            path: path.into(),
            closed: false,
            version,
            start_times: HashMap::new(),
            end_times: HashMap::new(),
            flushed_metas: HashMap::new(),
            mem_chunks: HashMap::new(),
            modifications: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// True when nothing has been flushed yet
    pub fn end_times_empty(&self) -> bool {
        self.end_times.is_empty()
    }

    /// Flushed time range of one series, if the file holds it
    pub fn time_range_for(&self, path: &SeriesPath) -> Option<(Timestamp, Timestamp)> {
        let start = self.start_times.get(path.full())?;
        let end = self.end_times.get(path.full())?;
        Some((*start, *end))
    }

    /// True if the resource may hold satisfying data for the series
    pub fn satisfies(&self, path: &SeriesPath, filter: Option<&Filter>) -> bool {
        let Some((start, end)) = self.time_range_for(path) else {
            return false;
        };
        match filter {
            Some(f) => f.accepts_time_range(start, end),
            None => true,
        }
    }

    /// Record the metadata of a chunk group flushed to an unclosed file
    pub fn record_flushed_chunk(&mut self, path: &SeriesPath, meta: ChunkMetaData) {
        let start = self
            .start_times
            .entry(path.full().to_string())
            .or_insert(i64::MAX);
        *start = (*start).min(meta.start_time());
        let end = self
            .end_times
            .entry(path.full().to_string())
            .or_insert(i64::MIN);
        *end = (*end).max(meta.end_time());
        self.flushed_metas
            .entry(path.full().to_string())
            .or_default()
            .push(meta);
    }

    /// Metadata of flushed chunks for one series (unclosed files)
    pub fn flushed_metas(&self, path: &SeriesPath) -> Vec<ChunkMetaData> {
        self.flushed_metas
            .get(path.full())
            .cloned()
            .unwrap_or_default()
    }

    /// Install the unflushed tail for one series
    pub fn set_mem_chunk(&mut self, path: &SeriesPath, chunk: ReadOnlyMemChunk) {
        self.mem_chunks.insert(path.full().to_string(), chunk);
    }

    /// Unflushed tail for one series, if any
    pub fn mem_chunk(&self, path: &SeriesPath) -> Option<&ReadOnlyMemChunk> {
        self.mem_chunks.get(path.full())
    }

    /// Attach a pending deletion
    pub fn add_modification(&mut self, modification: Modification) {
        self.modifications.push(modification);
    }

    /// Pending deletions targeting one series
    pub fn modifications_for(&self, path: &SeriesPath) -> Vec<Modification> {
        self.modifications
            .iter()
            .filter(|m| m.path == path.full())
            .cloned()
            .collect()
    }
}

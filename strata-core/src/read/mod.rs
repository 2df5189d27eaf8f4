//! The layered read path
//!
//! `SeriesReader` resolves one series across sequential files,
//! unsequential files, and unflushed memory. The sequential side chains
//! file readers in order; the unsequential side merges overlapping
//! sources by priority. Every layer is a cooperative iterator driven by
//! the consumer; nothing is produced ahead of a `next_batch` call.

mod batch;
mod merge;
mod point;
mod seq;
mod series;
mod series_reader;
mod unseq;

pub use batch::BatchData;
pub use crate::config::BATCH_SIZE;
pub use merge::PriorityMergeReader;
pub use point::{DiskChunkReader, MemChunkReader};
pub use seq::SeqResourceReader;
pub use series::{FileSeriesReader, FileSeriesReaderByTimestamp};
pub use series_reader::SeriesReader;
pub use unseq::UnseqResourceMergeReader;

use crate::file::{FileReaderCache, MetadataCache};
use crate::types::TimeValuePair;
use crate::Result;
use std::sync::Arc;

/// Point-at-a-time reader capability used by the merge layer
pub trait IPointReader {
    /// True if another pair is available
    fn has_next(&mut self) -> Result<bool>;

    /// Peek the next pair without consuming it
    fn current(&mut self) -> Result<TimeValuePair>;

    /// Consume and return the next pair
    fn next(&mut self) -> Result<TimeValuePair>;

    /// Release resources; idempotent
    fn close(&mut self);
}

/// Batch-at-a-time reader capability exposed to consumers
pub trait IBatchReader {
    /// True if another batch is available
    fn has_next_batch(&mut self) -> Result<bool>;

    /// Produce the next batch
    fn next_batch(&mut self) -> Result<BatchData>;

    /// Release resources; idempotent
    fn close(&mut self);
}

/// Per-query bundle of the shared caches
#[derive(Clone, Default)]
pub struct QueryContext {
    pub files: Arc<FileReaderCache>,
    pub metadata: Arc<MetadataCache>,
}

impl QueryContext {
    /// Create a context with fresh caches
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context over existing shared caches
    pub fn with_caches(files: Arc<FileReaderCache>, metadata: Arc<MetadataCache>) -> Self {
        Self { files, metadata }
    }
}

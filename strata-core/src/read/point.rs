//! Point-reader adapters over disk chunks and mem-chunks

use super::{BatchData, IPointReader};
use crate::chunk::ChunkReader;
use crate::file::ReadOnlyMemChunk;
use crate::filter::Filter;
use crate::types::{Timestamp, TimeValuePair};
use crate::{Result, StrataError};

/// Drives one chunk reader point by point, skipping empty batches
pub struct DiskChunkReader {
    reader: ChunkReader,
    batch: Option<BatchData>,
    closed: bool,
}

impl DiskChunkReader {
    /// Wrap a chunk reader
    pub fn new(reader: ChunkReader) -> Self {
        Self {
            reader,
            batch: None,
            closed: false,
        }
    }

    fn position(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        loop {
            if let Some(batch) = &self.batch {
                if batch.has_next() {
                    return Ok(true);
                }
            }
            if self.reader.has_next_batch()? {
                self.batch = Some(self.reader.next_batch()?);
            } else {
                return Ok(false);
            }
        }
    }
}

impl IPointReader for DiskChunkReader {
    fn has_next(&mut self) -> Result<bool> {
        self.position()
    }

    fn current(&mut self) -> Result<TimeValuePair> {
        if !self.position()? {
            return Err(StrataError::Cancelled);
        }
        Ok(self.batch.as_ref().expect("positioned").current_pair())
    }

    fn next(&mut self) -> Result<TimeValuePair> {
        if !self.position()? {
            return Err(StrataError::Cancelled);
        }
        let batch = self.batch.as_mut().expect("positioned");
        let pair = batch.current_pair();
        batch.advance();
        Ok(pair)
    }

    fn close(&mut self) {
        self.closed = true;
        self.batch = None;
        self.reader.close();
    }
}

/// Reads the filtered snapshot of an unclosed file's in-memory tail
pub struct MemChunkReader {
    pairs: Vec<TimeValuePair>,
    idx: usize,
    closed: bool,
}

impl MemChunkReader {
    /// Snapshot a mem-chunk, applying the watermark before the filter
    pub fn new(chunk: &ReadOnlyMemChunk, filter: Option<&Filter>, deleted_at: Timestamp) -> Self {
        let pairs = chunk
            .pairs()
            .into_iter()
            .filter(|p| p.timestamp > deleted_at)
            .filter(|p| filter.map_or(true, |f| f.accepts_point(p.timestamp, &p.value)))
            .collect();
        Self {
            pairs,
            idx: 0,
            closed: false,
        }
    }
}

impl IPointReader for MemChunkReader {
    fn has_next(&mut self) -> Result<bool> {
        Ok(!self.closed && self.idx < self.pairs.len())
    }

    fn current(&mut self) -> Result<TimeValuePair> {
        if self.closed || self.idx >= self.pairs.len() {
            return Err(StrataError::Cancelled);
        }
        Ok(self.pairs[self.idx].clone())
    }

    fn next(&mut self) -> Result<TimeValuePair> {
        let pair = self.current()?;
        self.idx += 1;
        Ok(pair)
    }

    fn close(&mut self) {
        self.closed = true;
        self.pairs.clear();
    }
}

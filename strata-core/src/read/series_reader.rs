//! Facade combining the sequential and unsequential sides of one series

use super::{
    BatchData, IBatchReader, QueryContext, SeqResourceReader, UnseqResourceMergeReader, BATCH_SIZE,
};
use crate::file::FileResource;
use crate::filter::Filter;
use crate::types::{DataType, SeriesPath, Timestamp};
use crate::{Result, StrataError};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Init,
    Ready,
    Eof,
    Failed,
    Closed,
}

/// Resolves one series across all of its sources.
///
/// On each step the side with the smaller current timestamp supplies the
/// next point; on a tie the unsequential side wins (newer version) and
/// the sequential duplicate is dropped. A fault in either side moves the
/// reader to a terminal failed state; later calls fail fast.
pub struct SeriesReader {
    data_type: DataType,
    seq: SeqResourceReader,
    unseq: UnseqResourceMergeReader,
    seq_batch: Option<BatchData>,
    unseq_batch: Option<BatchData>,
    state: ReaderState,
}

impl SeriesReader {
    /// Build both sides of the read path for one series
    pub fn new(
        path: &SeriesPath,
        data_type: DataType,
        seq_resources: Vec<Arc<FileResource>>,
        unseq_resources: &[Arc<FileResource>],
        filter: Option<Filter>,
        ctx: &QueryContext,
    ) -> Result<Self> {
        let seq = SeqResourceReader::new(
            path.clone(),
            data_type,
            seq_resources,
            filter.clone(),
            ctx.clone(),
        );
        let unseq =
            UnseqResourceMergeReader::new(path, data_type, unseq_resources, filter, ctx)?;
        Ok(Self {
            data_type,
            seq,
            unseq,
            seq_batch: None,
            unseq_batch: None,
            state: ReaderState::Init,
        })
    }

    fn fail<T>(&mut self, err: StrataError) -> Result<T> {
        warn!(error = %err, "series reader failed");
        self.state = ReaderState::Failed;
        Err(err)
    }

    /// Current timestamp of the sequential side, pulling batches as needed
    fn seq_peek(&mut self) -> Result<Option<Timestamp>> {
        loop {
            if let Some(batch) = &self.seq_batch {
                if batch.has_next() {
                    return Ok(Some(batch.current_time()));
                }
            }
            if self.seq.has_next_batch()? {
                self.seq_batch = Some(self.seq.next_batch()?);
            } else {
                self.seq_batch = None;
                return Ok(None);
            }
        }
    }

    fn unseq_peek(&mut self) -> Result<Option<Timestamp>> {
        loop {
            if let Some(batch) = &self.unseq_batch {
                if batch.has_next() {
                    return Ok(Some(batch.current_time()));
                }
            }
            if self.unseq.has_next_batch()? {
                self.unseq_batch = Some(self.unseq.next_batch()?);
            } else {
                self.unseq_batch = None;
                return Ok(None);
            }
        }
    }

    fn check_usable(&self) -> Result<()> {
        match self.state {
            ReaderState::Failed | ReaderState::Closed => Err(StrataError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl IBatchReader for SeriesReader {
    fn has_next_batch(&mut self) -> Result<bool> {
        self.check_usable()?;
        if self.state == ReaderState::Eof {
            return Ok(false);
        }
        let seq = match self.seq_peek() {
            Ok(ts) => ts,
            Err(e) => return self.fail(e),
        };
        let unseq = match self.unseq_peek() {
            Ok(ts) => ts,
            Err(e) => return self.fail(e),
        };
        if seq.is_none() && unseq.is_none() {
            self.state = ReaderState::Eof;
            Ok(false)
        } else {
            self.state = ReaderState::Ready;
            Ok(true)
        }
    }

    fn next_batch(&mut self) -> Result<BatchData> {
        self.check_usable()?;
        let mut batch = BatchData::new(self.data_type);
        if self.state == ReaderState::Eof {
            return Ok(batch);
        }
        while batch.len() < BATCH_SIZE {
            let seq_time = match self.seq_peek() {
                Ok(ts) => ts,
                Err(e) => return self.fail(e),
            };
            let unseq_time = match self.unseq_peek() {
                Ok(ts) => ts,
                Err(e) => return self.fail(e),
            };
            let take_unseq = match (seq_time, unseq_time) {
                (None, None) => break,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (Some(seq_ts), Some(unseq_ts)) => {
                    if unseq_ts == seq_ts {
                        // shadowed sequential duplicate
                        let seq_batch = self.seq_batch.as_mut().expect("peeked seq batch");
                        seq_batch.advance();
                    }
                    unseq_ts <= seq_ts
                }
            };
            let source = if take_unseq {
                self.unseq_batch.as_mut().expect("peeked unseq batch")
            } else {
                self.seq_batch.as_mut().expect("peeked seq batch")
            };
            let result = batch.put(source.current_time(), source.current_value());
            source.advance();
            if let Err(e) = result {
                return self.fail(e);
            }
        }
        self.state = if batch.is_empty() {
            ReaderState::Eof
        } else {
            ReaderState::Ready
        };
        Ok(batch)
    }

    fn close(&mut self) {
        if self.state == ReaderState::Closed {
            return;
        }
        self.state = ReaderState::Closed;
        self.seq_batch = None;
        self.unseq_batch = None;
        self.seq.close();
        self.unseq.close();
    }
}

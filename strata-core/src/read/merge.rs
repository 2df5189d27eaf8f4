//! Priority merge of overlapping point readers

use super::IPointReader;
use crate::types::TimeValuePair;
use crate::{Result, StrataError};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One buffered cursor position of a child reader
struct HeapEntry {
    pair: TimeValuePair,
    priority: u64,
    reader_id: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.pair.timestamp == other.pair.timestamp
            && self.priority == other.priority
            && self.reader_id == other.reader_id
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // BinaryHeap is a max-heap: order so the top is the smallest
    // timestamp, then the highest priority, then the highest reader id
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .pair
            .timestamp
            .cmp(&self.pair.timestamp)
            .then(self.priority.cmp(&other.priority))
            .then(self.reader_id.cmp(&other.reader_id))
    }
}

/// Merges N point readers by ascending timestamp; on a timestamp tie the
/// higher-priority reader wins and the shadowed values are dropped.
#[derive(Default)]
pub struct PriorityMergeReader {
    readers: Vec<Box<dyn IPointReader>>,
    heap: BinaryHeap<HeapEntry>,
    closed: bool,
}

impl PriorityMergeReader {
    /// Create an empty merge reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child with its priority; the child's first pair is buffered
    pub fn add_reader(&mut self, mut reader: Box<dyn IPointReader>, priority: u64) -> Result<()> {
        let reader_id = self.readers.len();
        if reader.has_next()? {
            let pair = reader.next()?;
            self.heap.push(HeapEntry {
                pair,
                priority,
                reader_id,
            });
        }
        self.readers.push(reader);
        Ok(())
    }

    fn refill(&mut self, reader_id: usize, priority: u64) -> Result<()> {
        let reader = &mut self.readers[reader_id];
        if reader.has_next()? {
            let pair = reader.next()?;
            self.heap.push(HeapEntry {
                pair,
                priority,
                reader_id,
            });
        }
        Ok(())
    }
}

impl IPointReader for PriorityMergeReader {
    fn has_next(&mut self) -> Result<bool> {
        Ok(!self.heap.is_empty())
    }

    fn current(&mut self) -> Result<TimeValuePair> {
        self.heap
            .peek()
            .map(|entry| entry.pair.clone())
            .ok_or(StrataError::Cancelled)
    }

    fn next(&mut self) -> Result<TimeValuePair> {
        let top = self.heap.pop().ok_or(StrataError::Cancelled)?;
        // entries tied on the winner's timestamp are shadowed: discard
        // their pairs and advance their readers
        while let Some(peek) = self.heap.peek() {
            if peek.pair.timestamp != top.pair.timestamp {
                break;
            }
            let shadowed = self.heap.pop().expect("peeked entry");
            self.refill(shadowed.reader_id, shadowed.priority)?;
        }
        self.refill(top.reader_id, top.priority)?;
        Ok(top.pair)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.heap.clear();
        for reader in &mut self.readers {
            reader.close();
        }
    }
}

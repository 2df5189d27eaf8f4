//! Priority merge over the unsequential files of one series

use super::{
    BatchData, DiskChunkReader, IBatchReader, IPointReader, MemChunkReader, PriorityMergeReader,
    QueryContext, BATCH_SIZE,
};
use crate::chunk::{ChunkMetaData, ChunkReader};
use crate::file::{ChunkLoader, FileResource};
use crate::filter::Filter;
use crate::modification::modify_chunk_metas;
use crate::types::{DataType, SeriesPath, Timestamp};
use crate::{Result, StrataError};
use std::sync::Arc;

/// Merges every unsequential source of one series by priority.
///
/// Construction collects and decorates the surviving chunk metadata of
/// all unsequential resources: tombstones applied, statistics pruning
/// into a fresh list, monotone priorities (mem-chunks above their file's
/// disk chunks), one shared loader per resource, globally sorted by
/// start time. Execution feeds chunks into the merge heap eagerly: a
/// pending chunk opens as soon as the heap's top timestamp reaches its
/// start time or the heap drains.
pub struct UnseqResourceMergeReader {
    data_type: DataType,
    filter: Option<Filter>,
    merge: PriorityMergeReader,
    metas: Vec<ChunkMetaData>,
    idx: usize,
    next_chunk_start: Timestamp,
    batch: Option<BatchData>,
    closed: bool,
}

impl UnseqResourceMergeReader {
    /// Collect chunk metadata and prime the merge heap.
    ///
    /// Resources must be ordered oldest to newest so the assigned
    /// priorities resolve duplicate timestamps toward the newest write.
    pub fn new(
        path: &SeriesPath,
        data_type: DataType,
        resources: &[Arc<FileResource>],
        filter: Option<Filter>,
        ctx: &QueryContext,
    ) -> Result<Self> {
        let mut merge = PriorityMergeReader::new();
        let mut metas: Vec<ChunkMetaData> = Vec::new();
        let mut priority: u64 = 1;

        for resource in resources {
            if !resource.end_times_empty() && !resource.satisfies(path, filter.as_ref()) {
                continue;
            }

            let mut current: Vec<ChunkMetaData> = if resource.is_closed() {
                (*ctx.metadata.get(resource, path.full(), &ctx.files)?).clone()
            } else {
                resource.flushed_metas(path)
            };
            for meta in &mut current {
                meta.set_version(resource.version());
            }
            let modifications = resource.modifications_for(path);
            if !modifications.is_empty() {
                modify_chunk_metas(&mut current, &modifications);
            }

            // keep only satisfying chunks, built as a fresh list
            let mut satisfying: Vec<ChunkMetaData> = current
                .into_iter()
                .filter(|meta| meta.satisfies(filter.as_ref()))
                .collect();
            if !satisfying.is_empty() {
                let loader = Arc::new(ChunkLoader::new(ctx.files.get(resource)?));
                for meta in &mut satisfying {
                    meta.set_priority(priority);
                    priority += 1;
                    meta.set_loader(loader.clone());
                }
                metas.append(&mut satisfying);
            }

            // the unflushed tail outranks every disk chunk of its file
            if !resource.is_closed() {
                if let Some(mem) = resource.mem_chunk(path) {
                    if !mem.is_empty() {
                        let reader = MemChunkReader::new(mem, filter.as_ref(), i64::MIN);
                        merge.add_reader(Box::new(reader), priority)?;
                        priority += 1;
                    }
                }
            }
        }

        metas.sort_by_key(|meta| meta.start_time());

        let mut reader = Self {
            data_type,
            filter,
            merge,
            metas,
            idx: 0,
            next_chunk_start: i64::MAX,
            batch: None,
            closed: false,
        };
        if reader.idx < reader.metas.len() {
            reader.add_next_chunk()?;
        }
        Ok(reader)
    }

    fn add_next_chunk(&mut self) -> Result<()> {
        let meta = self.metas[self.idx].clone();
        self.idx += 1;
        let loader = meta
            .loader()
            .cloned()
            .ok_or_else(|| StrataError::InvalidFormat("chunk metadata missing loader".into()))?;
        let chunk = loader.load(&meta)?;
        let chunk_reader = ChunkReader::new(chunk, self.filter.clone())?;
        self.merge
            .add_reader(Box::new(DiskChunkReader::new(chunk_reader)), meta.priority())?;
        self.next_chunk_start = self
            .metas
            .get(self.idx)
            .map(|m| m.start_time())
            .unwrap_or(i64::MAX);
        Ok(())
    }

    fn build_batch(&mut self) -> Result<BatchData> {
        let mut batch = BatchData::new(self.data_type);
        while batch.len() < BATCH_SIZE {
            if !self.merge.has_next()? {
                if self.idx < self.metas.len() {
                    self.add_next_chunk()?;
                    continue;
                }
                break;
            }
            if self.idx < self.metas.len()
                && self.merge.current()?.timestamp >= self.next_chunk_start
            {
                // the pending chunk may hold earlier or shadowing points
                self.add_next_chunk()?;
                continue;
            }
            let pair = self.merge.next()?;
            batch.put(pair.timestamp, pair.value)?;
        }
        Ok(batch)
    }
}

impl IBatchReader for UnseqResourceMergeReader {
    fn has_next_batch(&mut self) -> Result<bool> {
        if self.closed {
            return Err(StrataError::Cancelled);
        }
        if let Some(batch) = &self.batch {
            if batch.has_next() {
                return Ok(true);
            }
        }
        let batch = self.build_batch()?;
        let has = !batch.is_empty();
        self.batch = Some(batch);
        Ok(has)
    }

    fn next_batch(&mut self) -> Result<BatchData> {
        if self.closed {
            return Err(StrataError::Cancelled);
        }
        match self.batch.take() {
            Some(batch) => Ok(batch),
            None => self.build_batch(),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.batch = None;
        self.merge.close();
    }
}

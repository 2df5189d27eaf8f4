//! Chunk loader handle shared by a query's chunk metadata

use super::TsFileReader;
use crate::chunk::{Chunk, ChunkMetaData};
use crate::Result;
use std::sync::Arc;

/// Resolves chunk metadata to chunk bytes through a cached file handle.
///
/// One loader is created per resource per query and shared by all of
/// that resource's surviving metas; it pins the file handle open for the
/// query's lifetime even if the cache evicts it.
#[derive(Debug, Clone)]
pub struct ChunkLoader {
    reader: Arc<TsFileReader>,
}

impl ChunkLoader {
    /// Wrap a borrowed file handle
    pub fn new(reader: Arc<TsFileReader>) -> Self {
        Self { reader }
    }

    /// Materialize the chunk a meta points at
    pub fn load(&self, meta: &ChunkMetaData) -> Result<Chunk> {
        self.reader.read_chunk(meta)
    }
}

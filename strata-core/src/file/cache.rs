//! Shared caches: open file handles and per-series chunk metadata

use super::{FileResource, TsFileReader};
use crate::chunk::ChunkMetaData;
use crate::config;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

type CacheKey = (PathBuf, bool);

struct CacheEntry {
    reader: Arc<TsFileReader>,
    last_used: u64,
}

struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    tick: u64,
}

/// Bounded cache of open file handles keyed by `(path, closed)`.
///
/// Borrows are `Arc` clones, so an in-flight query pins its file open
/// even under eviction; the descriptor closes when the last borrow
/// drops. Eviction is LRU and only removes handles with no outstanding
/// borrows.
pub struct FileReaderCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl FileReaderCache {
    /// Create a cache bounded to `capacity` open handles
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Borrow the handle for a resource, opening the file on miss
    pub fn get(&self, resource: &FileResource) -> Result<Arc<TsFileReader>> {
        let key = (resource.path().to_path_buf(), resource.is_closed());
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(entry) = inner.map.get_mut(&key) {
            entry.last_used = tick;
            return Ok(entry.reader.clone());
        }

        let reader = if resource.is_closed() {
            Arc::new(TsFileReader::open(resource.path())?)
        } else {
            Arc::new(TsFileReader::open_unclosed(resource.path())?)
        };
        if inner.map.len() >= self.capacity {
            Self::evict_one(&mut inner);
        }
        inner.map.insert(
            key,
            CacheEntry {
                reader: reader.clone(),
                last_used: tick,
            },
        );
        Ok(reader)
    }

    /// Number of cached handles
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// True if no handles are cached
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    fn evict_one(inner: &mut CacheInner) {
        let victim = inner
            .map
            .iter()
            .filter(|(_, entry)| Arc::strong_count(&entry.reader) == 1)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        match victim {
            Some(key) => {
                inner.map.remove(&key);
                debug!(path = %key.0.display(), "evicted file handle");
            }
            // every handle is borrowed; exceed capacity until one frees up
            None => debug!("file handle cache over capacity, all handles borrowed"),
        }
    }
}

impl Default for FileReaderCache {
    fn default() -> Self {
        Self::new(config::FILE_CACHE_CAPACITY)
    }
}

/// Read-mostly cache of `(file, series) → chunk metadata`.
///
/// Survives file-handle eviction, so repeated queries over the same
/// series skip the index walk. Entries are immutable; queries clone the
/// list before stamping per-query state onto it.
#[derive(Default)]
pub struct MetadataCache {
    inner: Mutex<HashMap<(PathBuf, String), Arc<Vec<ChunkMetaData>>>>,
}

impl MetadataCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata of one series in one closed file, populated on miss
    pub fn get(
        &self,
        resource: &FileResource,
        series: &str,
        files: &FileReaderCache,
    ) -> Result<Arc<Vec<ChunkMetaData>>> {
        let key = (resource.path().to_path_buf(), series.to_string());
        if let Some(metas) = self.inner.lock().get(&key) {
            return Ok(metas.clone());
        }
        // populate outside the lock so a slow index walk does not block
        // unrelated series
        let reader = files.get(resource)?;
        let metas = reader.chunk_metas(series);
        self.inner.lock().insert(key, metas.clone());
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use crate::compression::CompressionType;
    use crate::encoding::Encoding;
    use crate::file::TsFileWriter;
    use crate::types::{DataType, Endianness, SeriesPath, TsValue};
    use tempfile::TempDir;

    fn write_resource(dir: &TempDir, name: &str) -> FileResource {
        let series = SeriesPath::new("root.d.m");
        let mut chunk_writer = ChunkWriter::new(
            "m",
            DataType::Double,
            Encoding::Plain,
            CompressionType::Uncompressed,
            Endianness::Little,
            16,
        )
        .unwrap();
        chunk_writer.write(1, &TsValue::Double(1.0)).unwrap();
        let mut writer = TsFileWriter::new(dir.path().join(name), 1).unwrap();
        writer.write_chunk(&series, chunk_writer.finish().unwrap()).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_hit_returns_same_handle() {
        let temp_dir = TempDir::new().unwrap();
        let resource = write_resource(&temp_dir, "a.strata");
        let cache = FileReaderCache::new(4);
        let first = cache.get(&resource).unwrap();
        let second = cache.get(&resource).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_skips_borrowed_handles() {
        let temp_dir = TempDir::new().unwrap();
        let a = write_resource(&temp_dir, "a.strata");
        let b = write_resource(&temp_dir, "b.strata");
        let c = write_resource(&temp_dir, "c.strata");
        let cache = FileReaderCache::new(2);

        let borrowed_a = cache.get(&a).unwrap();
        drop(cache.get(&b).unwrap());
        // `a` is still borrowed, so the LRU-but-borrowed handle survives
        // and `b` is evicted instead
        drop(cache.get(&c).unwrap());
        assert_eq!(cache.len(), 2);
        let again_a = cache.get(&a).unwrap();
        assert!(Arc::ptr_eq(&borrowed_a, &again_a));
    }

    #[test]
    fn test_metadata_cache_populates_on_miss() {
        let temp_dir = TempDir::new().unwrap();
        let resource = write_resource(&temp_dir, "a.strata");
        let files = FileReaderCache::new(2);
        let metas_cache = MetadataCache::new();

        let first = metas_cache.get(&resource, "root.d.m", &files).unwrap();
        assert_eq!(first.len(), 1);
        let second = metas_cache.get(&resource, "root.d.m", &files).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

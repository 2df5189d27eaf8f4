//! Chunk iteration within one file for one series

use super::BatchData;
use crate::chunk::{ChunkMetaData, ChunkReader};
use crate::file::ChunkLoader;
use crate::filter::Filter;
use crate::types::{DataType, Timestamp, TsValue};
use crate::{Result, StrataError};
use std::sync::Arc;

/// Filtered scan over the chunks of one file.
///
/// Chunks are pruned by their metadata statistics before any bytes are
/// loaded; surviving chunks stream batches page by page.
pub struct FileSeriesReader {
    loader: Arc<ChunkLoader>,
    metas: Vec<ChunkMetaData>,
    idx: usize,
    chunk_reader: Option<ChunkReader>,
    filter: Option<Filter>,
    data_type: DataType,
}

impl FileSeriesReader {
    /// Create a reader over one file's chunk metadata, in storage order
    pub fn new(
        loader: Arc<ChunkLoader>,
        metas: Vec<ChunkMetaData>,
        filter: Option<Filter>,
        data_type: DataType,
    ) -> Self {
        Self {
            loader,
            metas,
            idx: 0,
            chunk_reader: None,
            filter,
            data_type,
        }
    }

    /// Data type of the series
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Position on the next chunk holding a satisfying page
    pub fn has_next_batch(&mut self) -> Result<bool> {
        loop {
            if let Some(reader) = &mut self.chunk_reader {
                if reader.has_next_batch()? {
                    return Ok(true);
                }
            }
            let meta = loop {
                if self.idx >= self.metas.len() {
                    return Ok(false);
                }
                let meta = &self.metas[self.idx];
                self.idx += 1;
                if meta.satisfies(self.filter.as_ref()) {
                    break meta.clone();
                }
            };
            let chunk = self.loader.load(&meta)?;
            self.chunk_reader = Some(ChunkReader::new(chunk, self.filter.clone())?);
        }
    }

    /// Produce the positioned batch; may be empty after point filtering
    pub fn next_batch(&mut self) -> Result<BatchData> {
        if !self.has_next_batch()? {
            return Ok(BatchData::new(self.data_type));
        }
        self.chunk_reader
            .as_mut()
            .expect("positioned chunk reader")
            .next_batch()
    }

    /// Release the active chunk reader
    pub fn close(&mut self) {
        if let Some(mut reader) = self.chunk_reader.take() {
            reader.close();
        }
        self.idx = self.metas.len();
    }
}

/// Point lookup over the chunks of one file.
///
/// Repeated calls must use non-decreasing timestamps; a regression fails
/// with `OutOfOrderLookup`.
pub struct FileSeriesReaderByTimestamp {
    loader: Arc<ChunkLoader>,
    metas: Vec<ChunkMetaData>,
    idx: usize,
    chunk_reader: Option<ChunkReader>,
    data: Option<BatchData>,
    current_timestamp: Timestamp,
}

impl FileSeriesReaderByTimestamp {
    /// Create a lookup reader over one file's chunk metadata
    pub fn new(loader: Arc<ChunkLoader>, metas: Vec<ChunkMetaData>) -> Self {
        Self {
            loader,
            metas,
            idx: 0,
            chunk_reader: None,
            data: None,
            current_timestamp: i64::MIN,
        }
    }

    /// Value recorded exactly at `ts`, or `None` if the series has no
    /// point there
    pub fn value_at(&mut self, ts: Timestamp) -> Result<Option<TsValue>> {
        if ts < self.current_timestamp {
            return Err(StrataError::OutOfOrderLookup {
                last: self.current_timestamp,
                requested: ts,
            });
        }
        self.current_timestamp = ts;

        if self.chunk_reader.is_none() {
            if !self.construct_next_chunk_reader()? {
                return Ok(None);
            }
            self.load_next_batch()?;
        } else if let Some(reader) = &mut self.chunk_reader {
            reader.set_current_timestamp(ts);
        }

        while let Some(batch) = &mut self.data {
            while batch.has_next() && batch.current_time() < ts {
                batch.advance();
            }
            if batch.has_next() {
                if batch.current_time() == ts {
                    let value = batch.current_value();
                    batch.advance();
                    return Ok(Some(value));
                }
                // the next stored timestamp is already past ts
                return Ok(None);
            }
            // batch exhausted: next page, then next chunk
            let reader = self.chunk_reader.as_mut().expect("open chunk reader");
            if reader.has_next_batch()? {
                self.data = Some(reader.next_batch()?);
            } else if self.construct_next_chunk_reader()? {
                self.load_next_batch()?;
            } else {
                self.data = None;
                return Ok(None);
            }
        }
        Ok(None)
    }

    fn construct_next_chunk_reader(&mut self) -> Result<bool> {
        while self.idx < self.metas.len() {
            let meta = self.metas[self.idx].clone();
            self.idx += 1;
            if meta.end_time() >= self.current_timestamp {
                let chunk = self.loader.load(&meta)?;
                let mut reader = ChunkReader::new_by_timestamp(chunk)?;
                reader.set_current_timestamp(self.current_timestamp);
                self.chunk_reader = Some(reader);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn load_next_batch(&mut self) -> Result<()> {
        let reader = self.chunk_reader.as_mut().expect("open chunk reader");
        self.data = if reader.has_next_batch()? {
            Some(reader.next_batch()?)
        } else {
            None
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use crate::compression::CompressionType;
    use crate::encoding::Encoding;
    use crate::file::{TsFileReader, TsFileWriter};
    use crate::types::{Endianness, SeriesPath};
    use tempfile::TempDir;

    fn file_with_chunks(dir: &TempDir, chunks: &[&[(i64, f64)]]) -> (Arc<ChunkLoader>, Vec<ChunkMetaData>) {
        let file_path = dir.path().join("0001.strata");
        let series = SeriesPath::new("root.d.m");
        let mut writer = TsFileWriter::new(&file_path, 1).unwrap();
        for points in chunks {
            let mut chunk_writer = ChunkWriter::new(
                "m",
                DataType::Double,
                Encoding::Gorilla,
                CompressionType::Lz4,
                Endianness::Little,
                1024,
            )
            .unwrap();
            for (ts, v) in *points {
                chunk_writer.write(*ts, &TsValue::Double(*v)).unwrap();
            }
            writer.write_chunk(&series, chunk_writer.finish().unwrap()).unwrap();
        }
        writer.finish().unwrap();

        let reader = Arc::new(TsFileReader::open(&file_path).unwrap());
        let metas = (*reader.chunk_metas("root.d.m")).clone();
        (Arc::new(ChunkLoader::new(reader)), metas)
    }

    #[test]
    fn test_point_lookup_single_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let (loader, metas) = file_with_chunks(&temp_dir, &[&[(1, 1.1), (2, 2.2), (3, 3.3)]]);
        let mut reader = FileSeriesReaderByTimestamp::new(loader, metas);
        assert_eq!(reader.value_at(2).unwrap(), Some(TsValue::Double(2.2)));
        assert_eq!(reader.value_at(4).unwrap(), None);
        assert_eq!(reader.value_at(5).unwrap(), None);
    }

    #[test]
    fn test_point_lookup_across_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let chunk_a: Vec<(i64, f64)> = (1..=5).map(|i| (i, i as f64)).collect();
        let chunk_b: Vec<(i64, f64)> = (10..=20).map(|i| (i, i as f64 * 10.0)).collect();
        let (loader, metas) = file_with_chunks(&temp_dir, &[&chunk_a, &chunk_b]);
        let mut reader = FileSeriesReaderByTimestamp::new(loader, metas);
        // 7 falls between the chunks
        assert_eq!(reader.value_at(7).unwrap(), None);
        assert_eq!(reader.value_at(10).unwrap(), Some(TsValue::Double(100.0)));
        assert_eq!(reader.value_at(20).unwrap(), Some(TsValue::Double(200.0)));
    }

    #[test]
    fn test_decreasing_lookup_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (loader, metas) = file_with_chunks(&temp_dir, &[&[(1, 1.0), (2, 2.0)]]);
        let mut reader = FileSeriesReaderByTimestamp::new(loader, metas);
        assert_eq!(reader.value_at(2).unwrap(), Some(TsValue::Double(2.0)));
        assert!(matches!(
            reader.value_at(1),
            Err(StrataError::OutOfOrderLookup { last: 2, requested: 1 })
        ));
    }

    #[test]
    fn test_scan_prunes_chunks_by_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let chunk_a: Vec<(i64, f64)> = (1..=5).map(|i| (i, i as f64)).collect();
        let chunk_b: Vec<(i64, f64)> = (10..=15).map(|i| (i, i as f64)).collect();
        let (loader, metas) = file_with_chunks(&temp_dir, &[&chunk_a, &chunk_b]);
        let filter = Filter::TimeGt(9);
        let mut reader = FileSeriesReader::new(loader, metas, Some(filter), DataType::Double);
        let mut times = Vec::new();
        while reader.has_next_batch().unwrap() {
            let mut batch = reader.next_batch().unwrap();
            while batch.has_next() {
                times.push(batch.current_time());
                batch.advance();
            }
        }
        assert_eq!(times, (10..=15).collect::<Vec<i64>>());
    }
}

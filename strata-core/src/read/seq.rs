//! Batch reader over the sequential files of one series

use super::{BatchData, FileSeriesReader, IBatchReader, QueryContext, BATCH_SIZE};
use crate::file::{ChunkLoader, FileResource};
use crate::filter::Filter;
use crate::modification::modify_chunk_metas;
use crate::types::{DataType, SeriesPath, TimeValuePair};
use crate::{Result, StrataError};
use std::sync::Arc;

/// Walks sequential resources in order, one file reader at a time.
///
/// Whole files are skipped through the resource-level time check; closed
/// files read their metadata through the shared cache with tombstones
/// applied; an unclosed file contributes its flushed chunks and then its
/// in-memory tail.
pub struct SeqResourceReader {
    path: SeriesPath,
    data_type: DataType,
    filter: Option<Filter>,
    resources: Vec<Arc<FileResource>>,
    idx: usize,
    ctx: QueryContext,
    current: Option<FileSeriesReader>,
    mem_pairs: Option<Vec<TimeValuePair>>,
    mem_idx: usize,
    closed: bool,
}

impl SeqResourceReader {
    /// Create a reader; resources must be in ascending time order
    pub fn new(
        path: SeriesPath,
        data_type: DataType,
        resources: Vec<Arc<FileResource>>,
        filter: Option<Filter>,
        ctx: QueryContext,
    ) -> Self {
        Self {
            path,
            data_type,
            filter,
            resources,
            idx: 0,
            ctx,
            current: None,
            mem_pairs: None,
            mem_idx: 0,
            closed: false,
        }
    }

    fn advance_resource(&mut self) -> Result<bool> {
        while self.idx < self.resources.len() {
            let resource = self.resources[self.idx].clone();
            self.idx += 1;

            if !resource.end_times_empty() && !resource.satisfies(&self.path, self.filter.as_ref())
            {
                continue;
            }

            let mut metas = if resource.is_closed() {
                (*self
                    .ctx
                    .metadata
                    .get(&resource, self.path.full(), &self.ctx.files)?)
                .clone()
            } else {
                resource.flushed_metas(&self.path)
            };
            for meta in &mut metas {
                meta.set_version(resource.version());
            }
            let modifications = resource.modifications_for(&self.path);
            if !modifications.is_empty() {
                modify_chunk_metas(&mut metas, &modifications);
            }

            if !metas.is_empty() {
                let loader = Arc::new(ChunkLoader::new(self.ctx.files.get(&resource)?));
                self.current = Some(FileSeriesReader::new(
                    loader,
                    metas,
                    self.filter.clone(),
                    self.data_type,
                ));
            }

            if !resource.is_closed() {
                if let Some(mem) = resource.mem_chunk(&self.path) {
                    let filter = self.filter.as_ref();
                    let pairs: Vec<TimeValuePair> = mem
                        .pairs()
                        .into_iter()
                        .filter(|p| filter.map_or(true, |f| f.accepts_point(p.timestamp, &p.value)))
                        .collect();
                    if !pairs.is_empty() {
                        self.mem_pairs = Some(pairs);
                        self.mem_idx = 0;
                    }
                }
            }

            if self.current.is_some() || self.mem_pairs.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn mem_batch(&mut self) -> Result<BatchData> {
        let mut batch = BatchData::new(self.data_type);
        if let Some(pairs) = &self.mem_pairs {
            while self.mem_idx < pairs.len() && batch.len() < BATCH_SIZE {
                let pair = &pairs[self.mem_idx];
                batch.put(pair.timestamp, pair.value.clone())?;
                self.mem_idx += 1;
            }
        }
        Ok(batch)
    }
}

impl IBatchReader for SeqResourceReader {
    fn has_next_batch(&mut self) -> Result<bool> {
        if self.closed {
            return Err(StrataError::Cancelled);
        }
        loop {
            if let Some(reader) = self.current.as_mut() {
                if reader.has_next_batch()? {
                    return Ok(true);
                }
                self.current = None;
            }
            if let Some(pairs) = &self.mem_pairs {
                if self.mem_idx < pairs.len() {
                    return Ok(true);
                }
                self.mem_pairs = None;
                self.mem_idx = 0;
            }
            if !self.advance_resource()? {
                return Ok(false);
            }
        }
    }

    fn next_batch(&mut self) -> Result<BatchData> {
        if !self.has_next_batch()? {
            return Ok(BatchData::new(self.data_type));
        }
        if let Some(reader) = self.current.as_mut() {
            return reader.next_batch();
        }
        self.mem_batch()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut reader) = self.current.take() {
            reader.close();
        }
        self.mem_pairs = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use crate::compression::CompressionType;
    use crate::encoding::Encoding;
    use crate::file::{ReadOnlyMemChunk, TsFileWriter};
    use crate::types::{Endianness, TsValue};
    use tempfile::TempDir;

    fn closed_resource(
        dir: &TempDir,
        name: &str,
        version: u64,
        points: &[(i64, f64)],
    ) -> Arc<FileResource> {
        let series = SeriesPath::new("root.d.m");
        let mut chunk_writer = ChunkWriter::new(
            "m",
            DataType::Double,
            Encoding::Gorilla,
            CompressionType::Lz4,
            Endianness::Little,
            1024,
        )
        .unwrap();
        for (ts, v) in points {
            chunk_writer.write(*ts, &TsValue::Double(*v)).unwrap();
        }
        let mut writer = TsFileWriter::new(dir.path().join(name), version).unwrap();
        writer.write_chunk(&series, chunk_writer.finish().unwrap()).unwrap();
        Arc::new(writer.finish().unwrap())
    }

    fn drain(reader: &mut SeqResourceReader) -> Vec<(i64, f64)> {
        let mut out = Vec::new();
        while reader.has_next_batch().unwrap() {
            let mut batch = reader.next_batch().unwrap();
            while batch.has_next() {
                match batch.current_value() {
                    TsValue::Double(v) => out.push((batch.current_time(), v)),
                    other => panic!("unexpected value {:?}", other),
                }
                batch.advance();
            }
        }
        out
    }

    #[test]
    fn test_chains_files_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let a = closed_resource(&temp_dir, "a.strata", 1, &[(1, 1.0), (2, 2.0)]);
        let b = closed_resource(&temp_dir, "b.strata", 2, &[(10, 10.0), (11, 11.0)]);
        let mut reader = SeqResourceReader::new(
            SeriesPath::new("root.d.m"),
            DataType::Double,
            vec![a, b],
            None,
            QueryContext::new(),
        );
        assert_eq!(
            drain(&mut reader),
            vec![(1, 1.0), (2, 2.0), (10, 10.0), (11, 11.0)]
        );
    }

    #[test]
    fn test_skips_files_outside_filter() {
        let temp_dir = TempDir::new().unwrap();
        let a = closed_resource(&temp_dir, "a.strata", 1, &[(1, 1.0), (2, 2.0)]);
        let b = closed_resource(&temp_dir, "b.strata", 2, &[(10, 10.0), (11, 11.0)]);
        let mut reader = SeqResourceReader::new(
            SeriesPath::new("root.d.m"),
            DataType::Double,
            vec![a, b],
            Some(Filter::TimeGt(5)),
            QueryContext::new(),
        );
        assert_eq!(drain(&mut reader), vec![(10, 10.0), (11, 11.0)]);
    }

    #[test]
    fn test_unclosed_resource_serves_mem_tail() {
        let series = SeriesPath::new("root.d.m");
        let mut resource = FileResource::new_unclosed("/nonexistent/u.strata", 3);
        let mut mem = ReadOnlyMemChunk::new(DataType::Double);
        mem.write(100, TsValue::Double(100.0)).unwrap();
        mem.write(101, TsValue::Double(101.0)).unwrap();
        resource.set_mem_chunk(&series, mem);

        let mut reader = SeqResourceReader::new(
            series,
            DataType::Double,
            vec![Arc::new(resource)],
            None,
            QueryContext::new(),
        );
        assert_eq!(drain(&mut reader), vec![(100, 100.0), (101, 101.0)]);
    }

    #[test]
    fn test_close_fails_fast() {
        let mut reader = SeqResourceReader::new(
            SeriesPath::new("root.d.m"),
            DataType::Double,
            Vec::new(),
            None,
            QueryContext::new(),
        );
        reader.close();
        reader.close();
        assert!(matches!(
            reader.has_next_batch(),
            Err(StrataError::Cancelled)
        ));
    }
}

//! File-level reader: footer, index, and chunk materialization

use super::{FILE_MAGIC, FILE_VERSION};
use crate::chunk::{Chunk, ChunkHeader, ChunkMetaData};
use crate::{Result, StrataError};
use bytes::{Buf, Bytes};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FOOTER_SIZE: u64 = 8 + 4 + 4;

/// Open handle to one file: parsed index plus a positioned descriptor.
///
/// Handles are shared through the [`super::FileReaderCache`]; the
/// descriptor closes when the last borrow drops.
#[derive(Debug)]
pub struct TsFileReader {
    path: PathBuf,
    file: Mutex<File>,
    index: HashMap<String, Arc<Vec<ChunkMetaData>>>,
}

impl TsFileReader {
    /// Open a file still being written: magic verified, no index yet.
    ///
    /// Chunks of an unclosed file are located through the metadata its
    /// resource tracks in memory, so only `read_chunk` is usable.
    pub fn open_unclosed(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = File::open(&path)?;
        let mut magic = [0u8; 5];
        file.read_exact(&mut magic)?;
        if &magic[..4] != FILE_MAGIC {
            return Err(StrataError::InvalidFormat("bad file magic".into()));
        }
        if magic[4] != FILE_VERSION {
            return Err(StrataError::InvalidFormat(format!(
                "unsupported file version: {}",
                magic[4]
            )));
        }
        Ok(Self {
            path,
            file: Mutex::new(file),
            index: HashMap::new(),
        })
    }

    /// Open a file, verify magic and footer CRC, parse the index
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let header_len = (FILE_MAGIC.len() + 1) as u64;
        if file_len < header_len + FOOTER_SIZE {
            return Err(StrataError::InvalidFormat(format!(
                "file too short: {} bytes",
                file_len
            )));
        }

        let mut magic = [0u8; 5];
        file.read_exact(&mut magic)?;
        if &magic[..4] != FILE_MAGIC {
            return Err(StrataError::InvalidFormat("bad file magic".into()));
        }
        if magic[4] != FILE_VERSION {
            return Err(StrataError::InvalidFormat(format!(
                "unsupported file version: {}",
                magic[4]
            )));
        }

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        if &footer[12..] != FILE_MAGIC {
            return Err(StrataError::InvalidFormat("bad footer magic".into()));
        }
        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&footer[..8]);
        let index_offset = i64::from_le_bytes(offset_bytes);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&footer[8..12]);
        let expected_crc = u32::from_le_bytes(crc_bytes);
        if index_offset < header_len as i64 || index_offset as u64 > file_len - FOOTER_SIZE {
            return Err(StrataError::InvalidFormat(format!(
                "index offset {} out of bounds",
                index_offset
            )));
        }

        let index_len = file_len - FOOTER_SIZE - index_offset as u64;
        file.seek(SeekFrom::Start(index_offset as u64))?;
        let mut index_raw = vec![0u8; index_len as usize];
        file.read_exact(&mut index_raw)?;
        let actual_crc = crc32fast::hash(&index_raw);
        if actual_crc != expected_crc {
            return Err(StrataError::ChecksumMismatch {
                expected: expected_crc,
                actual: actual_crc,
            });
        }

        let index = Self::parse_index(Bytes::from(index_raw))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            index,
        })
    }

    fn parse_index(mut buf: Bytes) -> Result<HashMap<String, Arc<Vec<ChunkMetaData>>>> {
        if buf.remaining() < 4 {
            return Err(StrataError::InvalidFormat("index truncated".into()));
        }
        let series_count = buf.get_i32_le();
        if series_count < 0 {
            return Err(StrataError::InvalidFormat("negative series count".into()));
        }
        let mut index = HashMap::with_capacity(series_count as usize);
        for _ in 0..series_count {
            if buf.remaining() < 4 {
                return Err(StrataError::InvalidFormat("index truncated".into()));
            }
            let name_len = buf.get_i32_le();
            if name_len < 0 || buf.remaining() < name_len as usize + 4 {
                return Err(StrataError::InvalidFormat("index truncated".into()));
            }
            let name_raw = buf.copy_to_bytes(name_len as usize);
            let series = String::from_utf8(name_raw.to_vec())
                .map_err(|e| StrataError::InvalidFormat(format!("invalid series name: {}", e)))?;
            let meta_count = buf.get_i32_le();
            if meta_count < 0 {
                return Err(StrataError::InvalidFormat("negative chunk count".into()));
            }
            let mut metas = Vec::with_capacity(meta_count as usize);
            for _ in 0..meta_count {
                metas.push(ChunkMetaData::deserialize(&mut buf)?);
            }
            index.insert(series, Arc::new(metas));
        }
        Ok(index)
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk metadata of one series; empty if the file does not hold it
    pub fn chunk_metas(&self, series: &str) -> Arc<Vec<ChunkMetaData>> {
        self.index
            .get(series)
            .cloned()
            .unwrap_or_else(|| Arc::new(Vec::new()))
    }

    /// Materialize one chunk: seek to the meta's offset, re-read the
    /// header, read the page run. The returned chunk carries the meta's
    /// per-query deletion watermark.
    pub fn read_chunk(&self, meta: &ChunkMetaData) -> Result<Chunk> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(meta.offset()))?;
        let header = ChunkHeader::read_from(&mut *file)?;
        let mut body = vec![0u8; header.body_size as usize];
        file.read_exact(&mut body)?;
        Ok(Chunk {
            endianness: header.endianness,
            header,
            data: Bytes::from(body),
            deleted_at: meta.deleted_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkReader, ChunkWriter};
    use crate::compression::CompressionType;
    use crate::encoding::Encoding;
    use crate::file::TsFileWriter;
    use crate::types::{DataType, Endianness, SeriesPath, TsValue};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, points: &[(i64, f64)]) -> PathBuf {
        let file_path = dir.path().join(name);
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
        let mut writer = TsFileWriter::new(&file_path, 1).unwrap();
        writer.write_chunk(&series, chunk_writer.finish().unwrap()).unwrap();
        writer.finish().unwrap();
        file_path
    }

    #[test]
    fn test_open_and_read_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let points = vec![(1, 1.1), (2, 2.2), (3, 3.3)];
        let file_path = write_file(&temp_dir, "0001.strata", &points);

        let reader = TsFileReader::open(&file_path).unwrap();
        let metas = reader.chunk_metas("root.d.m");
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].start_time(), 1);
        assert_eq!(metas[0].end_time(), 3);
        assert_eq!(metas[0].num_points(), 3);

        let chunk = reader.read_chunk(&metas[0]).unwrap();
        let mut chunk_reader = ChunkReader::new(chunk, None).unwrap();
        assert!(chunk_reader.has_next_batch().unwrap());
        let batch = chunk_reader.next_batch().unwrap();
        assert_eq!(batch.times(), &[1, 2, 3]);
    }

    #[test]
    fn test_unknown_series_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = write_file(&temp_dir, "0001.strata", &[(1, 1.0)]);
        let reader = TsFileReader::open(&file_path).unwrap();
        assert!(reader.chunk_metas("root.d.absent").is_empty());
    }

    #[test]
    fn test_corrupted_index_fails_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = write_file(&temp_dir, "0001.strata", &[(1, 1.0), (2, 2.0)]);

        // flip one byte inside the index region
        let raw = std::fs::read(&file_path).unwrap();
        let mut damaged = raw.clone();
        let index_offset =
            i64::from_le_bytes(raw[raw.len() - 16..raw.len() - 8].try_into().unwrap()) as usize;
        damaged[index_offset + 2] ^= 0xff;
        let mut out = File::create(&file_path).unwrap();
        out.write_all(&damaged).unwrap();

        let err = TsFileReader::open(&file_path).unwrap_err();
        assert!(matches!(err, StrataError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("junk.strata");
        std::fs::write(&file_path, b"NOTAFILE_____________________").unwrap();
        let err = TsFileReader::open(&file_path).unwrap_err();
        assert!(err.is_corruption());
    }
}

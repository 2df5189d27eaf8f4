//! Deletion records and their application to chunk metadata

use crate::chunk::ChunkMetaData;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// A deletion: points of `path` with `ts <= delete_bound` are invisible
/// to any chunk whose version does not exceed the deletion's version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    /// Full dotted series path the deletion targets
    pub path: String,
    /// Write-order version the deletion was issued at
    pub version: u64,
    /// Inclusive upper bound of deleted timestamps
    pub delete_bound: Timestamp,
}

impl Modification {
    /// Create a deletion record
    pub fn new(path: impl Into<String>, version: u64, delete_bound: Timestamp) -> Self {
        Self {
            path: path.into(),
            version,
            delete_bound,
        }
    }
}

/// Raise each meta's deletion watermark to the strongest applicable
/// bound. A modification applies when its version is at least the
/// chunk's version.
pub fn modify_chunk_metas(metas: &mut [ChunkMetaData], modifications: &[Modification]) {
    for meta in metas.iter_mut() {
        for modification in modifications {
            if modification.version >= meta.version() {
                meta.set_deleted_at(meta.deleted_at().max(modification.delete_bound));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::Statistics;
    use crate::types::DataType;

    fn meta_with_version(version: u64) -> ChunkMetaData {
        let mut meta = ChunkMetaData::new(
            "m",
            DataType::Double,
            0,
            0,
            100,
            0,
            Statistics::new(DataType::Double),
        );
        meta.set_version(version);
        meta
    }

    #[test]
    fn test_watermark_raised_for_covered_versions() {
        let mut metas = vec![meta_with_version(1), meta_with_version(5)];
        let mods = vec![Modification::new("root.d.m", 3, 20)];
        modify_chunk_metas(&mut metas, &mods);
        assert_eq!(metas[0].deleted_at(), 20);
        assert_eq!(metas[1].deleted_at(), i64::MIN);
    }

    #[test]
    fn test_strongest_bound_wins() {
        let mut metas = vec![meta_with_version(1)];
        let mods = vec![
            Modification::new("root.d.m", 2, 10),
            Modification::new("root.d.m", 3, 50),
            Modification::new("root.d.m", 4, 30),
        ];
        modify_chunk_metas(&mut metas, &mods);
        assert_eq!(metas[0].deleted_at(), 50);
    }
}

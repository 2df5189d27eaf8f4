//! Error types for Strata

use crate::types::DataType;
use thiserror::Error;

/// Result type alias for Strata operations
pub type Result<T> = std::result::Result<T, StrataError>;

/// Strata error types
#[derive(Error, Debug)]
pub enum StrataError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Chunk bytes disagree with their header
    #[error("Corrupt chunk: {0}")]
    CorruptChunk(String),

    /// Data type code outside the enumerated set
    #[error("Unknown data type code: {0}")]
    UnknownType(u8),

    /// Merging statistics of different types
    #[error("Statistics type mismatch: expected {expected}, got {actual}")]
    StatisticsTypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    /// Decoder asked for more bytes than the page provides
    #[error("Decode error: {0}")]
    Decode(String),

    /// Point lookup called with a timestamp less than the previous one
    #[error("Out-of-order lookup: timestamp {requested} is less than previous {last}")]
    OutOfOrderLookup { last: i64, requested: i64 },

    /// Iterator used after close() or after a prior failure
    #[error("Reader is closed")]
    Cancelled,

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Compression/decompression error
    #[error("Compression error: {0}")]
    Compression(String),
}

impl StrataError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StrataError::Io(_))
    }

    /// Check if error indicates corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StrataError::CorruptChunk(_)
                | StrataError::ChecksumMismatch { .. }
                | StrataError::InvalidFormat(_)
        )
    }
}

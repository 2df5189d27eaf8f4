//! Strata Core - Columnar Time-Series File Engine (read path)
//!
//! Strata resolves a query for a single measurement series across
//! on-disk files and in-memory buffers into an ordered stream of
//! timestamped values, honouring deletions, statistics-based pruning,
//! and merge-by-priority across overlapping sources.
//!
//! # Architecture
//!
//! The read path is a stack of cooperative iterators:
//!
//! - **PageReader**: decodes one compressed page into a batch
//! - **ChunkReader**: iterates a chunk's pages, pruning by page headers
//! - **FileSeriesReader**: iterates a file's chunks, pruning by metadata
//! - **PriorityMergeReader**: merges overlapping sources, newest wins
//! - **SeriesReader**: one facade over the sequential and unsequential
//!   sides of a series

pub mod chunk;
pub mod compression;
pub mod encoding;
pub mod file;
pub mod filter;
pub mod modification;
pub mod read;
pub mod statistics;

mod error;
mod types;

pub use error::{Result, StrataError};
pub use types::*;

/// Strata version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    use crate::encoding::Encoding;

    /// Maximum points per produced batch
    pub const BATCH_SIZE: usize = 10_000;

    /// Maximum open file handles held by the reader cache
    pub const FILE_CACHE_CAPACITY: usize = 64;

    /// Points per page before the chunk writer seals it
    pub const PAGE_POINT_LIMIT: usize = 1024;

    /// Engine-wide encoding of time columns
    pub const TIME_ENCODING: Encoding = Encoding::TwoDiff;
}

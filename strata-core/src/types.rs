//! Core types for Strata

use crate::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Timestamp in nanoseconds since Unix epoch
pub type Timestamp = i64;

/// Data type of a measurement series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Text,
}

impl DataType {
    /// Wire code of this data type
    pub fn code(&self) -> u8 {
        match self {
            DataType::Bool => 0,
            DataType::Int32 => 1,
            DataType::Int64 => 2,
            DataType::Float => 3,
            DataType::Double => 4,
            DataType::Text => 5,
        }
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DataType::Bool),
            1 => Ok(DataType::Int32),
            2 => Ok(DataType::Int64),
            3 => Ok(DataType::Float),
            4 => Ok(DataType::Double),
            5 => Ok(DataType::Text),
            _ => Err(StrataError::UnknownType(code)),
        }
    }

    /// Fixed byte width of one datum, or -1 for variable-length types
    pub fn size_of_datum(&self) -> i32 {
        match self {
            DataType::Bool => 1,
            DataType::Int32 => 4,
            DataType::Int64 => 8,
            DataType::Float => 4,
            DataType::Double => 8,
            DataType::Text => -1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "BOOL",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Text => "TEXT",
        };
        write!(f, "{}", name)
    }
}

/// Byte order of plain-encoded page payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl Endianness {
    /// Wire code: BIG=0, LITTLE=1
    pub fn code(&self) -> u8 {
        match self {
            Endianness::Big => 0,
            Endianness::Little => 1,
        }
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Endianness::Big),
            1 => Ok(Endianness::Little),
            _ => Err(StrataError::CorruptChunk(format!(
                "invalid endianness code: {}",
                code
            ))),
        }
    }
}

/// A typed value of a single point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TsValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Text(String),
}

impl TsValue {
    /// Data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            TsValue::Bool(_) => DataType::Bool,
            TsValue::Int32(_) => DataType::Int32,
            TsValue::Int64(_) => DataType::Int64,
            TsValue::Float(_) => DataType::Float,
            TsValue::Double(_) => DataType::Double,
            TsValue::Text(_) => DataType::Text,
        }
    }

    /// Get as f64 if numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TsValue::Int32(v) => Some(*v as f64),
            TsValue::Int64(v) => Some(*v as f64),
            TsValue::Float(v) => Some(*v as f64),
            TsValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Compare with another value of the same type; `None` across types
    pub fn compare(&self, other: &TsValue) -> Option<Ordering> {
        match (self, other) {
            (TsValue::Bool(a), TsValue::Bool(b)) => Some(a.cmp(b)),
            (TsValue::Int32(a), TsValue::Int32(b)) => Some(a.cmp(b)),
            (TsValue::Int64(a), TsValue::Int64(b)) => Some(a.cmp(b)),
            (TsValue::Float(a), TsValue::Float(b)) => a.partial_cmp(b),
            (TsValue::Double(a), TsValue::Double(b)) => a.partial_cmp(b),
            (TsValue::Text(a), TsValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for TsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TsValue::Bool(v) => write!(f, "{}", v),
            TsValue::Int32(v) => write!(f, "{}", v),
            TsValue::Int64(v) => write!(f, "{}", v),
            TsValue::Float(v) => write!(f, "{}", v),
            TsValue::Double(v) => write!(f, "{}", v),
            TsValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// A single timestamped value
#[derive(Debug, Clone, PartialEq)]
pub struct TimeValuePair {
    pub timestamp: Timestamp,
    pub value: TsValue,
}

impl TimeValuePair {
    /// Create a new pair
    pub fn new(timestamp: Timestamp, value: TsValue) -> Self {
        Self { timestamp, value }
    }
}

/// Dotted identifier of a single measurement series, e.g. `root.g.dev.sensor`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesPath {
    full: String,
}

impl SeriesPath {
    /// Create a series path from its full dotted form
    pub fn new(full: impl Into<String>) -> Self {
        Self { full: full.into() }
    }

    /// Full dotted path
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Measurement id: the final path segment
    pub fn measurement(&self) -> &str {
        match self.full.rfind('.') {
            Some(idx) => &self.full[idx + 1..],
            None => &self.full,
        }
    }

    /// Device prefix: everything before the final segment
    pub fn device(&self) -> &str {
        match self.full.rfind('.') {
            Some(idx) => &self.full[..idx],
            None => "",
        }
    }
}

impl fmt::Display for SeriesPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full)
    }
}

/// Inclusive time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive)
    pub start: Timestamp,
    /// End timestamp (inclusive)
    pub end: Timestamp,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Check if a timestamp is within the range
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Check if two ranges overlap
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_codes() {
        for code in 0..=5u8 {
            let dt = DataType::from_code(code).unwrap();
            assert_eq!(dt.code(), code);
        }
        assert!(matches!(
            DataType::from_code(9),
            Err(StrataError::UnknownType(9))
        ));
    }

    #[test]
    fn test_series_path_segments() {
        let path = SeriesPath::new("root.group.device.temperature");
        assert_eq!(path.measurement(), "temperature");
        assert_eq!(path.device(), "root.group.device");
        assert_eq!(path.full(), "root.group.device.temperature");
    }

    #[test]
    fn test_value_compare_same_type_only() {
        assert_eq!(
            TsValue::Double(1.5).compare(&TsValue::Double(2.0)),
            Some(Ordering::Less)
        );
        assert_eq!(TsValue::Double(1.5).compare(&TsValue::Int64(2)), None);
        assert_eq!(
            TsValue::Text("a".into()).compare(&TsValue::Text("b".into())),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_time_range() {
        let range = TimeRange::new(100, 200);
        assert!(range.contains(100));
        assert!(range.contains(200));
        assert!(!range.contains(201));
        assert!(range.overlaps(&TimeRange::new(150, 250)));
        assert!(!range.overlaps(&TimeRange::new(300, 400)));
    }
}

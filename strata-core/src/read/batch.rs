//! Batch of timestamped values with a moving cursor

use crate::types::{DataType, Timestamp, TimeValuePair, TsValue};
use crate::{Result, StrataError};

/// Typed column storage backing a batch
#[derive(Debug, Clone)]
enum BatchValues {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Text(Vec<String>),
}

impl BatchValues {
    fn new(data_type: DataType) -> Self {
        match data_type {
            DataType::Bool => BatchValues::Bool(Vec::new()),
            DataType::Int32 => BatchValues::Int32(Vec::new()),
            DataType::Int64 => BatchValues::Int64(Vec::new()),
            DataType::Float => BatchValues::Float(Vec::new()),
            DataType::Double => BatchValues::Double(Vec::new()),
            DataType::Text => BatchValues::Text(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            BatchValues::Bool(v) => v.len(),
            BatchValues::Int32(v) => v.len(),
            BatchValues::Int64(v) => v.len(),
            BatchValues::Float(v) => v.len(),
            BatchValues::Double(v) => v.len(),
            BatchValues::Text(v) => v.len(),
        }
    }

    fn get(&self, idx: usize) -> TsValue {
        match self {
            BatchValues::Bool(v) => TsValue::Bool(v[idx]),
            BatchValues::Int32(v) => TsValue::Int32(v[idx]),
            BatchValues::Int64(v) => TsValue::Int64(v[idx]),
            BatchValues::Float(v) => TsValue::Float(v[idx]),
            BatchValues::Double(v) => TsValue::Double(v[idx]),
            BatchValues::Text(v) => TsValue::Text(v[idx].clone()),
        }
    }

    fn push(&mut self, value: TsValue) -> Result<()> {
        match (self, value) {
            (BatchValues::Bool(col), TsValue::Bool(v)) => col.push(v),
            (BatchValues::Int32(col), TsValue::Int32(v)) => col.push(v),
            (BatchValues::Int64(col), TsValue::Int64(v)) => col.push(v),
            (BatchValues::Float(col), TsValue::Float(v)) => col.push(v),
            (BatchValues::Double(col), TsValue::Double(v)) => col.push(v),
            (BatchValues::Text(col), TsValue::Text(v)) => col.push(v),
            (col, value) => {
                return Err(StrataError::Decode(format!(
                    "batch of {} cannot hold {}",
                    match col {
                        BatchValues::Bool(_) => DataType::Bool,
                        BatchValues::Int32(_) => DataType::Int32,
                        BatchValues::Int64(_) => DataType::Int64,
                        BatchValues::Float(_) => DataType::Float,
                        BatchValues::Double(_) => DataType::Double,
                        BatchValues::Text(_) => DataType::Text,
                    },
                    value.data_type()
                )))
            }
        }
        Ok(())
    }
}

/// Parallel `times`/`values` arrays with a moving cursor.
///
/// Producers append with `put_time`/`put_value` (or `put`); consumers
/// drive the cursor with `has_next`/`current_*`/`advance`. Times are
/// non-decreasing within any batch produced by the read path.
#[derive(Debug, Clone)]
pub struct BatchData {
    data_type: DataType,
    times: Vec<Timestamp>,
    values: BatchValues,
    cursor: usize,
}

impl BatchData {
    /// Create an empty batch for a data type
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            times: Vec::new(),
            values: BatchValues::new(data_type),
            cursor: 0,
        }
    }

    /// Data type of the value column
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Append a timestamp; pair it with one `put_value` call
    pub fn put_time(&mut self, ts: Timestamp) {
        self.times.push(ts);
    }

    /// Append a value of the batch's type
    pub fn put_value(&mut self, value: TsValue) -> Result<()> {
        self.values.push(value)
    }

    /// Append one pair
    pub fn put(&mut self, ts: Timestamp, value: TsValue) -> Result<()> {
        self.put_time(ts);
        self.put_value(value)
    }

    /// Number of pairs in the batch
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True if the batch holds no pairs
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// True if the cursor has not reached the end
    pub fn has_next(&self) -> bool {
        self.cursor < self.times.len()
    }

    /// Timestamp at the cursor
    pub fn current_time(&self) -> Timestamp {
        self.times[self.cursor]
    }

    /// Value at the cursor
    pub fn current_value(&self) -> TsValue {
        self.values.get(self.cursor)
    }

    /// Pair at the cursor
    pub fn current_pair(&self) -> TimeValuePair {
        TimeValuePair::new(self.current_time(), self.current_value())
    }

    /// Move the cursor one pair forward
    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Timestamps of all pairs
    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_walk() {
        let mut batch = BatchData::new(DataType::Double);
        for i in 0..5 {
            batch.put(i, TsValue::Double(i as f64 * 1.5)).unwrap();
        }
        assert_eq!(batch.len(), 5);

        let mut seen = Vec::new();
        while batch.has_next() {
            seen.push((batch.current_time(), batch.current_value()));
            batch.advance();
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[2], (2, TsValue::Double(3.0)));
        assert!(!batch.has_next());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut batch = BatchData::new(DataType::Int64);
        assert!(batch.put(1, TsValue::Double(1.0)).is_err());
        assert!(batch.put(1, TsValue::Int64(1)).is_ok());
    }

    #[test]
    fn test_empty_batch() {
        let batch = BatchData::new(DataType::Text);
        assert!(batch.is_empty());
        assert!(!batch.has_next());
    }
}

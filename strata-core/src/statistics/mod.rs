//! Per-column statistics used for block pruning
//!
//! Every chunk and page carries a min/max/first/last/sum summary of its
//! column. Filters consult these summaries to skip blocks without
//! decompressing them. The wire format is a count-prefixed array of
//! `(slot_id, length, bytes)` entries; a legacy layout keyed by UTF-8
//! names is still accepted on read.

use crate::types::{DataType, Timestamp, TsValue};
use crate::{Result, StrataError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::cmp::Ordering;
use tracing::warn;

const SLOT_MIN: i16 = 0;
const SLOT_MAX: i16 = 1;
const SLOT_FIRST: i16 = 2;
const SLOT_LAST: i16 = 3;
const SLOT_SUM: i16 = 4;
const SLOT_COUNT: usize = 5;

const LEGACY_KEYS: [&str; SLOT_COUNT] = ["min_value", "max_value", "first", "last", "sum"];

/// Typed min/max/first/last of a non-empty statistics object.
///
/// All four values share the owning statistics' data type; `update`
/// enforces this at the enum boundary.
#[derive(Debug, Clone, PartialEq)]
struct StatValues {
    min: TsValue,
    max: TsValue,
    first: TsValue,
    last: TsValue,
}

/// Summary of one column over one block
#[derive(Debug, Clone)]
pub struct Statistics {
    data_type: DataType,
    count: u64,
    sum: f64,
    values: Option<StatValues>,
    // First/last timestamps are kept in memory only; deserialized
    // statistics fall back to merge-call order.
    first_time: Timestamp,
    last_time: Timestamp,
}

impl Statistics {
    /// Create empty statistics for a data type
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            count: 0,
            sum: 0.0,
            values: None,
            first_time: i64::MAX,
            last_time: i64::MIN,
        }
    }

    /// Data type of the summarized column
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// True if no value has been recorded
    pub fn is_empty(&self) -> bool {
        self.values.is_none()
    }

    /// Number of summarized points
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Set the point count; the wire format carries only the five value
    /// slots, so owners restore the count from `num_points`.
    pub fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    /// Sum of all numeric values (count of `true` for BOOL, 0 for TEXT)
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Minimum value, if any
    pub fn min(&self) -> Option<&TsValue> {
        self.values.as_ref().map(|v| &v.min)
    }

    /// Maximum value, if any
    pub fn max(&self) -> Option<&TsValue> {
        self.values.as_ref().map(|v| &v.max)
    }

    /// Earliest value, if any
    pub fn first(&self) -> Option<&TsValue> {
        self.values.as_ref().map(|v| &v.first)
    }

    /// Latest value, if any
    pub fn last(&self) -> Option<&TsValue> {
        self.values.as_ref().map(|v| &v.last)
    }

    /// Record one value.
    ///
    /// Extends min/max, sets `first` once, overwrites `last`, adds to the
    /// sum and increments the count. Timestamps within a chunk ascend, so
    /// the incoming pair is always the latest.
    pub fn update(&mut self, ts: Timestamp, value: &TsValue) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(StrataError::StatisticsTypeMismatch {
                expected: self.data_type,
                actual: value.data_type(),
            });
        }
        self.count += 1;
        self.sum += sum_contribution(value);
        match &mut self.values {
            None => {
                self.values = Some(StatValues {
                    min: value.clone(),
                    max: value.clone(),
                    first: value.clone(),
                    last: value.clone(),
                });
                self.first_time = ts;
                self.last_time = ts;
            }
            Some(v) => {
                if value.compare(&v.min) == Some(Ordering::Less) {
                    v.min = value.clone();
                }
                if value.compare(&v.max) == Some(Ordering::Greater) {
                    v.max = value.clone();
                }
                v.last = value.clone();
                self.last_time = ts;
            }
        }
        Ok(())
    }

    /// Record a batch of pairs
    pub fn update_batch(&mut self, pairs: &[(Timestamp, TsValue)]) -> Result<()> {
        for (ts, value) in pairs {
            self.update(*ts, value)?;
        }
        Ok(())
    }

    /// Merge another summary into this one.
    ///
    /// Widens min/max, keeps the earlier `first` and the later `last`,
    /// sums `sum` and `count`. A type mismatch surfaces an error without
    /// mutating the target.
    pub fn merge(&mut self, other: &Statistics) -> Result<()> {
        if other.data_type != self.data_type {
            warn!(
                expected = %self.data_type,
                actual = %other.data_type,
                "statistics type mismatch, refusing merge"
            );
            return Err(StrataError::StatisticsTypeMismatch {
                expected: self.data_type,
                actual: other.data_type,
            });
        }
        let Some(ov) = &other.values else {
            return Ok(());
        };
        match &mut self.values {
            None => {
                self.values = Some(ov.clone());
                self.count = other.count;
                self.sum = other.sum;
                self.first_time = other.first_time;
                self.last_time = other.last_time;
            }
            Some(v) => {
                if ov.min.compare(&v.min) == Some(Ordering::Less) {
                    v.min = ov.min.clone();
                }
                if ov.max.compare(&v.max) == Some(Ordering::Greater) {
                    v.max = ov.max.clone();
                }
                if other.first_time < self.first_time {
                    v.first = ov.first.clone();
                    self.first_time = other.first_time;
                }
                if other.last_time >= self.last_time {
                    v.last = ov.last.clone();
                    self.last_time = other.last_time;
                }
                self.count += other.count;
                self.sum += other.sum;
            }
        }
        Ok(())
    }

    /// Fixed byte width of one datum, or -1 for variable-length types
    pub fn size_of_datum(&self) -> i32 {
        self.data_type.size_of_datum()
    }

    /// Byte length of the raw value payload: 0 when empty, `4·datum + 8`
    /// for fixed-width types, `4·4 + Σlen + 8` for variable-length
    pub fn serialized_size(&self) -> usize {
        let Some(v) = &self.values else { return 0 };
        let datum = self.size_of_datum();
        if datum >= 0 {
            datum as usize * 4 + 8
        } else {
            4 * 4 + datum_len(&v.min) + datum_len(&v.max) + datum_len(&v.first) + datum_len(&v.last) + 8
        }
    }

    /// Serialize in the slot-id layout
    pub fn serialize(&self, buf: &mut BytesMut) {
        let Some(v) = &self.values else {
            buf.put_i32_le(0);
            return;
        };
        buf.put_i32_le(SLOT_COUNT as i32);
        for (slot, value) in [
            (SLOT_MIN, &v.min),
            (SLOT_MAX, &v.max),
            (SLOT_FIRST, &v.first),
            (SLOT_LAST, &v.last),
        ] {
            let mut datum = BytesMut::new();
            encode_datum(value, &mut datum);
            buf.put_i16_le(slot);
            buf.put_i32_le(datum.len() as i32);
            buf.put_slice(&datum);
        }
        buf.put_i16_le(SLOT_SUM);
        buf.put_i32_le(8);
        buf.put_f64_le(self.sum);
    }

    /// Deserialize in either the slot-id layout or the legacy named
    /// layout, distinguished by peeking the first entry.
    ///
    /// The deserialized count is zero; owners restore it from
    /// `num_points` via [`Statistics::set_count`].
    pub fn deserialize(buf: &mut Bytes, data_type: DataType) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(StrataError::Decode("statistics blob truncated".into()));
        }
        let valid_count = buf.get_i32_le();
        let mut stats = Statistics::new(data_type);
        if valid_count == 0 {
            return Ok(stats);
        }
        if valid_count < 0 || valid_count as usize > SLOT_COUNT {
            return Err(StrataError::Decode(format!(
                "invalid statistics slot count: {}",
                valid_count
            )));
        }

        let legacy = peek_legacy_key(buf);
        let mut slots: [Option<Bytes>; SLOT_COUNT] = Default::default();
        for _ in 0..valid_count {
            let slot = if legacy {
                let key = read_string(buf)?;
                match LEGACY_KEYS.iter().position(|k| *k == key) {
                    Some(idx) => idx as i16,
                    None => {
                        return Err(StrataError::Decode(format!(
                            "unknown legacy statistics key: {}",
                            key
                        )))
                    }
                }
            } else {
                if buf.remaining() < 2 {
                    return Err(StrataError::Decode("statistics entry truncated".into()));
                }
                buf.get_i16_le()
            };
            if !(0..SLOT_COUNT as i16).contains(&slot) {
                return Err(StrataError::Decode(format!(
                    "invalid statistics slot id: {}",
                    slot
                )));
            }
            let payload = read_length_prefixed(buf)?;
            slots[slot as usize] = Some(payload);
        }

        let take = |idx: usize| -> Result<Bytes> {
            slots[idx]
                .clone()
                .ok_or_else(|| StrataError::Decode(format!("missing statistics slot {}", idx)))
        };
        stats.values = Some(StatValues {
            min: decode_datum(data_type, &take(SLOT_MIN as usize)?)?,
            max: decode_datum(data_type, &take(SLOT_MAX as usize)?)?,
            first: decode_datum(data_type, &take(SLOT_FIRST as usize)?)?,
            last: decode_datum(data_type, &take(SLOT_LAST as usize)?)?,
        });
        let mut sum_bytes = take(SLOT_SUM as usize)?;
        if sum_bytes.len() != 8 {
            return Err(StrataError::Decode("statistics sum slot malformed".into()));
        }
        stats.sum = sum_bytes.get_f64_le();
        Ok(stats)
    }
}

// Equality covers the wire-visible content so serialize→deserialize
// round-trips compare equal; count and timestamps are owner-supplied.
impl PartialEq for Statistics {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.values == other.values
            && self.sum.to_bits() == other.sum.to_bits()
    }
}

fn sum_contribution(value: &TsValue) -> f64 {
    match value {
        TsValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        TsValue::Text(_) => 0.0,
        other => other.as_f64().unwrap_or(0.0),
    }
}

fn datum_len(value: &TsValue) -> usize {
    match value {
        TsValue::Text(s) => s.len(),
        other => other.data_type().size_of_datum() as usize,
    }
}

fn encode_datum(value: &TsValue, buf: &mut BytesMut) {
    match value {
        TsValue::Bool(v) => buf.put_u8(*v as u8),
        TsValue::Int32(v) => buf.put_i32_le(*v),
        TsValue::Int64(v) => buf.put_i64_le(*v),
        TsValue::Float(v) => buf.put_f32_le(*v),
        TsValue::Double(v) => buf.put_f64_le(*v),
        TsValue::Text(v) => buf.put_slice(v.as_bytes()),
    }
}

fn decode_datum(data_type: DataType, bytes: &Bytes) -> Result<TsValue> {
    let mut buf = bytes.clone();
    let need = data_type.size_of_datum();
    if need >= 0 && buf.remaining() != need as usize {
        return Err(StrataError::Decode(format!(
            "statistics datum for {} has {} bytes, expected {}",
            data_type,
            buf.remaining(),
            need
        )));
    }
    Ok(match data_type {
        DataType::Bool => TsValue::Bool(buf.get_u8() != 0),
        DataType::Int32 => TsValue::Int32(buf.get_i32_le()),
        DataType::Int64 => TsValue::Int64(buf.get_i64_le()),
        DataType::Float => TsValue::Float(buf.get_f32_le()),
        DataType::Double => TsValue::Double(buf.get_f64_le()),
        DataType::Text => TsValue::Text(
            String::from_utf8(buf.to_vec())
                .map_err(|e| StrataError::Decode(format!("invalid UTF-8 in statistics: {}", e)))?,
        ),
    })
}

/// Peek whether the next entry starts with a known legacy key string.
fn peek_legacy_key(buf: &Bytes) -> bool {
    let mut probe = buf.clone();
    if probe.remaining() < 4 {
        return false;
    }
    let len = probe.get_i32_le();
    if len <= 0 || len as usize > 16 || probe.remaining() < len as usize {
        return false;
    }
    let raw = probe.copy_to_bytes(len as usize);
    match std::str::from_utf8(&raw) {
        Ok(key) => LEGACY_KEYS.contains(&key),
        Err(_) => false,
    }
}

fn read_string(buf: &mut Bytes) -> Result<String> {
    let raw = read_length_prefixed(buf)?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| StrataError::Decode(format!("invalid UTF-8 string: {}", e)))
}

fn read_length_prefixed(buf: &mut Bytes) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(StrataError::Decode("length prefix truncated".into()));
    }
    let len = buf.get_i32_le();
    if len < 0 || buf.remaining() < len as usize {
        return Err(StrataError::Decode(format!(
            "length-prefixed payload truncated: need {}, have {}",
            len,
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double_stats(points: &[(i64, f64)]) -> Statistics {
        let mut stats = Statistics::new(DataType::Double);
        for (ts, v) in points {
            stats.update(*ts, &TsValue::Double(*v)).unwrap();
        }
        stats
    }

    #[test]
    fn test_update_tracks_min_max_first_last() {
        let stats = double_stats(&[(1, 3.0), (2, 1.0), (3, 7.0), (4, 5.0)]);
        assert_eq!(stats.min(), Some(&TsValue::Double(1.0)));
        assert_eq!(stats.max(), Some(&TsValue::Double(7.0)));
        assert_eq!(stats.first(), Some(&TsValue::Double(3.0)));
        assert_eq!(stats.last(), Some(&TsValue::Double(5.0)));
        assert_eq!(stats.count(), 4);
        assert!((stats.sum() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_widens_and_orders_by_time() {
        let mut a = double_stats(&[(10, 2.0), (20, 4.0)]);
        let b = double_stats(&[(1, 9.0), (5, 1.0)]);
        a.merge(&b).unwrap();
        assert_eq!(a.min(), Some(&TsValue::Double(1.0)));
        assert_eq!(a.max(), Some(&TsValue::Double(9.0)));
        // b starts earlier, so its first wins; a ends later, keeps last
        assert_eq!(a.first(), Some(&TsValue::Double(9.0)));
        assert_eq!(a.last(), Some(&TsValue::Double(4.0)));
        assert_eq!(a.count(), 4);
    }

    #[test]
    fn test_merge_type_mismatch_leaves_target_untouched() {
        let mut a = double_stats(&[(1, 2.0)]);
        let mut b = Statistics::new(DataType::Int64);
        b.update(1, &TsValue::Int64(5)).unwrap();
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(err, StrataError::StatisticsTypeMismatch { .. }));
        assert_eq!(a.min(), Some(&TsValue::Double(2.0)));
        assert_eq!(a.count(), 1);
    }

    #[test]
    fn test_slot_roundtrip() {
        let stats = double_stats(&[(1, 1.1), (2, 2.2), (3, 3.3)]);
        let mut buf = BytesMut::new();
        stats.serialize(&mut buf);
        let mut bytes = buf.freeze();
        let restored = Statistics::deserialize(&mut bytes, DataType::Double).unwrap();
        assert_eq!(restored, stats);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_text_roundtrip() {
        let mut stats = Statistics::new(DataType::Text);
        stats.update(1, &TsValue::Text("pear".into())).unwrap();
        stats.update(2, &TsValue::Text("apple".into())).unwrap();
        let mut buf = BytesMut::new();
        stats.serialize(&mut buf);
        let restored = Statistics::deserialize(&mut buf.freeze(), DataType::Text).unwrap();
        assert_eq!(restored.min(), Some(&TsValue::Text("apple".into())));
        assert_eq!(restored.max(), Some(&TsValue::Text("pear".into())));
        assert_eq!(restored, stats);
    }

    #[test]
    fn test_legacy_layout_matches_slot_layout() {
        let stats = double_stats(&[(1, 1.5), (2, -4.0), (3, 2.5)]);
        let mut slot = BytesMut::new();
        stats.serialize(&mut slot);

        // Same content keyed by names instead of slot ids
        let mut legacy = BytesMut::new();
        legacy.put_i32_le(5);
        let entries: [(&str, &TsValue); 4] = [
            ("min_value", stats.min().unwrap()),
            ("max_value", stats.max().unwrap()),
            ("first", stats.first().unwrap()),
            ("last", stats.last().unwrap()),
        ];
        for (key, value) in entries {
            legacy.put_i32_le(key.len() as i32);
            legacy.put_slice(key.as_bytes());
            let mut datum = BytesMut::new();
            encode_datum(value, &mut datum);
            legacy.put_i32_le(datum.len() as i32);
            legacy.put_slice(&datum);
        }
        legacy.put_i32_le(3);
        legacy.put_slice(b"sum");
        legacy.put_i32_le(8);
        legacy.put_f64_le(stats.sum());

        let from_slot = Statistics::deserialize(&mut slot.freeze(), DataType::Double).unwrap();
        let from_legacy = Statistics::deserialize(&mut legacy.freeze(), DataType::Double).unwrap();
        assert_eq!(from_slot, from_legacy);
    }

    #[test]
    fn test_empty_serializes_to_zero_count() {
        let stats = Statistics::new(DataType::Int32);
        assert_eq!(stats.serialized_size(), 0);
        let mut buf = BytesMut::new();
        stats.serialize(&mut buf);
        assert_eq!(&buf[..], &0i32.to_le_bytes());
        let restored = Statistics::deserialize(&mut buf.freeze(), DataType::Int32).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_serialized_size_formulas() {
        let mut int_stats = Statistics::new(DataType::Int32);
        int_stats.update(1, &TsValue::Int32(7)).unwrap();
        assert_eq!(int_stats.serialized_size(), 4 * 4 + 8);

        let mut text_stats = Statistics::new(DataType::Text);
        text_stats.update(1, &TsValue::Text("ab".into())).unwrap();
        // 4 length prefixes + 4 * 2 payload bytes + 8 for the sum
        assert_eq!(text_stats.serialized_size(), 16 + 8 + 8);
    }
}

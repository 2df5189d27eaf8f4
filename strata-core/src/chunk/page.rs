//! Reader for one decompressed page

use crate::encoding::Decoder;
use crate::filter::Filter;
use crate::read::BatchData;
use crate::types::{DataType, Timestamp, TsValue};
use crate::{Result, StrataError};
use bytes::{Buf, Bytes};

/// Decodes one page body into an ordered batch of `(time, value)` pairs.
///
/// A point is emitted iff its time is above the deletion watermark and
/// the filter, if any, accepts it. The watermark applies before the
/// filter, so a value filter never sees tombstoned data.
pub struct PageReader<'a> {
    data_type: DataType,
    time_buf: Bytes,
    value_buf: Bytes,
    time_decoder: &'a mut dyn Decoder,
    value_decoder: &'a mut dyn Decoder,
    filter: Option<&'a Filter>,
    deleted_at: Timestamp,
    consumed: bool,
}

impl<'a> std::fmt::Debug for PageReader<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReader")
            .field("data_type", &self.data_type)
            .field("time_buf", &self.time_buf)
            .field("value_buf", &self.value_buf)
            .field("deleted_at", &self.deleted_at)
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl<'a> PageReader<'a> {
    /// Create a reader over an uncompressed page body.
    ///
    /// The body starts with the `i32` byte length of the time column,
    /// followed by the time column and then the value column.
    pub fn new(
        mut body: Bytes,
        data_type: DataType,
        time_decoder: &'a mut dyn Decoder,
        value_decoder: &'a mut dyn Decoder,
        filter: Option<&'a Filter>,
        deleted_at: Timestamp,
    ) -> Result<Self> {
        if body.remaining() < 4 {
            return Err(StrataError::CorruptChunk("page body truncated".into()));
        }
        let time_len = body.get_i32_le();
        if time_len < 0 || body.remaining() < time_len as usize {
            return Err(StrataError::CorruptChunk(format!(
                "page time column of {} bytes exceeds body",
                time_len
            )));
        }
        let time_buf = body.split_to(time_len as usize);
        Ok(Self {
            data_type,
            time_buf,
            value_buf: body,
            time_decoder,
            value_decoder,
            filter,
            deleted_at,
            consumed: false,
        })
    }

    /// True until the page's batch has been produced
    pub fn has_next_batch(&self) -> bool {
        !self.consumed
    }

    /// Decode the whole page into one batch; may be empty after filtering
    pub fn next_batch(&mut self) -> Result<BatchData> {
        self.consumed = true;
        let mut batch = BatchData::new(self.data_type);
        while self.time_decoder.has_next(&mut self.time_buf)? {
            let ts = match self.time_decoder.next(&mut self.time_buf)? {
                TsValue::Int64(ts) => ts,
                other => {
                    return Err(StrataError::Decode(format!(
                        "time column decoded to {}",
                        other.data_type()
                    )))
                }
            };
            if !self.value_decoder.has_next(&mut self.value_buf)? {
                return Err(StrataError::Decode(
                    "value column shorter than time column".into(),
                ));
            }
            let value = self.value_decoder.next(&mut self.value_buf)?;
            if ts <= self.deleted_at {
                continue;
            }
            if self.filter.map_or(true, |f| f.accepts_point(ts, &value)) {
                batch.put(ts, value)?;
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{encoder_for, Encoding, PlainDecoder, TwoDiffDecoder};
    use crate::types::Endianness;
    use bytes::{BufMut, BytesMut};

    fn build_body(points: &[(i64, f64)]) -> Bytes {
        let mut time_encoder = encoder_for(Encoding::TwoDiff, DataType::Int64, Endianness::Little).unwrap();
        let mut value_encoder = encoder_for(Encoding::Plain, DataType::Double, Endianness::Little).unwrap();
        let mut time_buf = BytesMut::new();
        let mut value_buf = BytesMut::new();
        for (ts, v) in points {
            time_encoder.encode(&TsValue::Int64(*ts), &mut time_buf).unwrap();
            value_encoder.encode(&TsValue::Double(*v), &mut value_buf).unwrap();
        }
        time_encoder.flush(&mut time_buf).unwrap();
        value_encoder.flush(&mut value_buf).unwrap();

        let mut body = BytesMut::new();
        body.put_i32_le(time_buf.len() as i32);
        body.put_slice(&time_buf);
        body.put_slice(&value_buf);
        body.freeze()
    }

    fn read_all(
        body: Bytes,
        filter: Option<&Filter>,
        deleted_at: i64,
    ) -> Vec<(i64, f64)> {
        let mut time_decoder = TwoDiffDecoder::new();
        let mut value_decoder = PlainDecoder::new(DataType::Double, Endianness::Little);
        let mut reader = PageReader::new(
            body,
            DataType::Double,
            &mut time_decoder,
            &mut value_decoder,
            filter,
            deleted_at,
        )
        .unwrap();
        let mut batch = reader.next_batch().unwrap();
        let mut out = Vec::new();
        while batch.has_next() {
            match batch.current_value() {
                TsValue::Double(v) => out.push((batch.current_time(), v)),
                other => panic!("unexpected value {:?}", other),
            }
            batch.advance();
        }
        out
    }

    #[test]
    fn test_emits_all_points() {
        let points = vec![(1, 1.1), (2, 2.2), (3, 3.3)];
        let body = build_body(&points);
        assert_eq!(read_all(body, None, i64::MIN), points);
    }

    #[test]
    fn test_deletion_watermark_applies_before_filter() {
        let points = vec![(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)];
        let body = build_body(&points);
        // filter would accept everything below 10; watermark removes t <= 2
        let filter = Filter::ValueLt(TsValue::Double(10.0));
        assert_eq!(read_all(body, Some(&filter), 2), vec![(3, 3.0), (4, 4.0)]);
    }

    #[test]
    fn test_filter_can_empty_a_page() {
        let points = vec![(1, 1.0), (2, 2.0)];
        let body = build_body(&points);
        let filter = Filter::TimeGt(100);
        assert!(read_all(body, Some(&filter), i64::MIN).is_empty());
    }

    #[test]
    fn test_truncated_body_fails() {
        let mut time_decoder = TwoDiffDecoder::new();
        let mut value_decoder = PlainDecoder::new(DataType::Double, Endianness::Little);
        let mut body = BytesMut::new();
        body.put_i32_le(100);
        body.put_slice(&[0u8; 4]);
        let err = PageReader::new(
            body.freeze(),
            DataType::Double,
            &mut time_decoder,
            &mut value_decoder,
            None,
            i64::MIN,
        )
        .unwrap_err();
        assert!(err.is_corruption());
    }
}

//! Delta-of-delta codec for INT64 time columns
//!
//! Stream layout: `i32` point count, then a bitstream. The first value is
//! 64 raw bits; each following value encodes the change of its delta with
//! a variable-width prefix (`0`, `10`+7, `110`+9, `1110`+12, `1111`+64).

use super::bitstream::{BitReader, BitWriter};
use super::{Decoder, Encoder};
use crate::types::{Endianness, TsValue};
use crate::{Result, StrataError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Encoder for delta-of-delta INT64 columns
#[derive(Debug, Default)]
pub struct TwoDiffEncoder {
    writer: BitWriter,
    count: u32,
    prev: i64,
    prev_delta: i64,
}

impl TwoDiffEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder for TwoDiffEncoder {
    fn encode(&mut self, value: &TsValue, _buf: &mut BytesMut) -> Result<()> {
        let TsValue::Int64(v) = value else {
            return Err(StrataError::Decode(format!(
                "delta-of-delta encoder got {}",
                value.data_type()
            )));
        };
        if self.count == 0 {
            self.writer.write_bits(*v as u64, 64);
        } else {
            let delta = v - self.prev;
            let dod = delta - self.prev_delta;
            if dod == 0 {
                self.writer.write_bit(false);
            } else if (-63..=64).contains(&dod) {
                self.writer.write_bits(0b10, 2);
                self.writer.write_bits((dod + 63) as u64, 7);
            } else if (-255..=256).contains(&dod) {
                self.writer.write_bits(0b110, 3);
                self.writer.write_bits((dod + 255) as u64, 9);
            } else if (-2047..=2048).contains(&dod) {
                self.writer.write_bits(0b1110, 4);
                self.writer.write_bits((dod + 2047) as u64, 12);
            } else {
                self.writer.write_bits(0b1111, 4);
                self.writer.write_bits(dod as u64, 64);
            }
            self.prev_delta = delta;
        }
        self.prev = *v;
        self.count += 1;
        Ok(())
    }

    fn flush(&mut self, buf: &mut BytesMut) -> Result<()> {
        buf.put_i32_le(self.count as i32);
        let writer = std::mem::take(&mut self.writer);
        buf.put_slice(&writer.finish());
        self.count = 0;
        self.prev = 0;
        self.prev_delta = 0;
        Ok(())
    }
}

/// Decoder for delta-of-delta INT64 columns
#[derive(Debug, Default)]
pub struct TwoDiffDecoder {
    reader: Option<BitReader>,
    remaining: u32,
    started: bool,
    prev: i64,
    prev_delta: i64,
}

impl TwoDiffDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_init(&mut self, buf: &mut Bytes) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        if buf.is_empty() {
            self.reader = Some(BitReader::new(Bytes::new()));
            self.remaining = 0;
            return Ok(());
        }
        if buf.remaining() < 4 {
            return Err(StrataError::Decode(
                "delta-of-delta stream missing count prefix".into(),
            ));
        }
        let count = buf.get_i32_le();
        if count < 0 {
            return Err(StrataError::Decode(format!(
                "negative delta-of-delta count: {}",
                count
            )));
        }
        self.remaining = count as u32;
        let payload = buf.copy_to_bytes(buf.remaining());
        self.reader = Some(BitReader::new(payload));
        Ok(())
    }

    fn bits(&mut self, n: usize) -> Result<u64> {
        self.reader
            .as_mut()
            .and_then(|r| r.read_bits(n))
            .ok_or_else(|| StrataError::Decode("delta-of-delta stream exhausted".into()))
    }

    fn bit(&mut self) -> Result<bool> {
        self.reader
            .as_mut()
            .and_then(|r| r.read_bit())
            .ok_or_else(|| StrataError::Decode("delta-of-delta stream exhausted".into()))
    }
}

impl Decoder for TwoDiffDecoder {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn set_endianness(&mut self, _endianness: Endianness) {
        // bit-packed streams carry no byte order
    }

    fn has_next(&mut self, buf: &mut Bytes) -> Result<bool> {
        self.ensure_init(buf)?;
        Ok(self.remaining > 0)
    }

    fn next(&mut self, buf: &mut Bytes) -> Result<TsValue> {
        self.ensure_init(buf)?;
        if self.remaining == 0 {
            return Err(StrataError::Decode("delta-of-delta stream exhausted".into()));
        }
        let value = if !self.started {
            self.started = true;
            self.bits(64)? as i64
        } else {
            let dod = if !self.bit()? {
                0
            } else if !self.bit()? {
                self.bits(7)? as i64 - 63
            } else if !self.bit()? {
                self.bits(9)? as i64 - 255
            } else if !self.bit()? {
                self.bits(12)? as i64 - 2047
            } else {
                self.bits(64)? as i64
            };
            let delta = self.prev_delta + dod;
            self.prev_delta = delta;
            self.prev + delta
        };
        self.prev = value;
        self.remaining -= 1;
        Ok(TsValue::Int64(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(values: &[i64]) {
        let mut encoder = TwoDiffEncoder::new();
        let mut buf = BytesMut::new();
        for v in values {
            encoder.encode(&TsValue::Int64(*v), &mut buf).unwrap();
        }
        encoder.flush(&mut buf).unwrap();

        let mut decoder = TwoDiffDecoder::new();
        let mut bytes = buf.freeze();
        let mut decoded = Vec::new();
        while decoder.has_next(&mut bytes).unwrap() {
            match decoder.next(&mut bytes).unwrap() {
                TsValue::Int64(v) => decoded.push(v),
                other => panic!("unexpected value {:?}", other),
            }
        }
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_constant_delta() {
        let values: Vec<i64> = (0..200).map(|i| 1_000 + i * 10).collect();
        roundtrip(&values);
    }

    #[test]
    fn test_irregular_deltas() {
        roundtrip(&[5, 6, 100, 101, -4000, 12_345_678_901, 12_345_678_902]);
    }

    #[test]
    fn test_single_and_empty() {
        roundtrip(&[42]);
        roundtrip(&[]);
    }

    #[test]
    fn test_empty_buffer_has_no_next() {
        let mut decoder = TwoDiffDecoder::new();
        let mut bytes = Bytes::new();
        assert!(!decoder.has_next(&mut bytes).unwrap());
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut encoder = TwoDiffEncoder::new();
        let mut buf = BytesMut::new();
        encoder.encode(&TsValue::Int64(7), &mut buf).unwrap();
        encoder.flush(&mut buf).unwrap();

        let mut decoder = TwoDiffDecoder::new();
        let mut bytes = buf.freeze();
        assert!(decoder.has_next(&mut bytes).unwrap());
        decoder.next(&mut bytes).unwrap();
        decoder.reset();

        let mut buf2 = BytesMut::new();
        encoder.encode(&TsValue::Int64(9), &mut buf2).unwrap();
        encoder.flush(&mut buf2).unwrap();
        let mut bytes2 = buf2.freeze();
        assert_eq!(decoder.next(&mut bytes2).unwrap(), TsValue::Int64(9));
    }
}

//! XOR codec for DOUBLE value columns
//!
//! Stream layout: `i32` point count, then a bitstream. The first value is
//! 64 raw bits; each following value XORs against the previous bit
//! pattern. Identical values cost one bit; otherwise the meaningful bits
//! are written either inside the previous leading/trailing window (`10`)
//! or with a fresh window header (`11` + 5-bit leading + 6-bit
//! length-minus-one).

use super::bitstream::{BitReader, BitWriter};
use super::{Decoder, Encoder};
use crate::types::{Endianness, TsValue};
use crate::{Result, StrataError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Encoder for XOR-compressed DOUBLE columns
#[derive(Debug)]
pub struct GorillaEncoder {
    writer: BitWriter,
    count: u32,
    prev_bits: u64,
    prev_leading: u32,
    prev_trailing: u32,
}

impl GorillaEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            writer: BitWriter::new(),
            count: 0,
            prev_bits: 0,
            // no window yet
            prev_leading: u32::MAX,
            prev_trailing: 0,
        }
    }
}

impl Default for GorillaEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for GorillaEncoder {
    fn encode(&mut self, value: &TsValue, _buf: &mut BytesMut) -> Result<()> {
        let TsValue::Double(v) = value else {
            return Err(StrataError::Decode(format!(
                "XOR encoder got {}",
                value.data_type()
            )));
        };
        let bits = v.to_bits();
        if self.count == 0 {
            self.writer.write_bits(bits, 64);
        } else {
            let xor = bits ^ self.prev_bits;
            if xor == 0 {
                self.writer.write_bit(false);
            } else {
                self.writer.write_bit(true);
                let leading = xor.leading_zeros().min(31);
                let trailing = xor.trailing_zeros();

                if self.prev_leading != u32::MAX
                    && leading >= self.prev_leading
                    && trailing >= self.prev_trailing
                {
                    // reuse the previous window
                    self.writer.write_bit(false);
                    let meaningful = 64 - self.prev_leading - self.prev_trailing;
                    self.writer
                        .write_bits(xor >> self.prev_trailing, meaningful as usize);
                } else {
                    self.writer.write_bit(true);
                    let meaningful = 64 - leading - trailing;
                    self.writer.write_bits(leading as u64, 5);
                    self.writer.write_bits((meaningful - 1) as u64, 6);
                    self.writer.write_bits(xor >> trailing, meaningful as usize);
                    self.prev_leading = leading;
                    self.prev_trailing = trailing;
                }
            }
        }
        self.prev_bits = bits;
        self.count += 1;
        Ok(())
    }

    fn flush(&mut self, buf: &mut BytesMut) -> Result<()> {
        buf.put_i32_le(self.count as i32);
        let writer = std::mem::take(&mut self.writer);
        buf.put_slice(&writer.finish());
        *self = Self::new();
        Ok(())
    }
}

/// Decoder for XOR-compressed DOUBLE columns
#[derive(Debug, Default)]
pub struct GorillaDecoder {
    reader: Option<BitReader>,
    remaining: u32,
    started: bool,
    prev_bits: u64,
    prev_leading: u32,
    prev_trailing: u32,
}

impl GorillaDecoder {
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
            return Err(StrataError::Decode("XOR stream missing count prefix".into()));
        }
        let count = buf.get_i32_le();
        if count < 0 {
            return Err(StrataError::Decode(format!("negative XOR count: {}", count)));
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
            .ok_or_else(|| StrataError::Decode("XOR stream exhausted".into()))
    }

    fn bit(&mut self) -> Result<bool> {
        self.reader
            .as_mut()
            .and_then(|r| r.read_bit())
            .ok_or_else(|| StrataError::Decode("XOR stream exhausted".into()))
    }
}

impl Decoder for GorillaDecoder {
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
            return Err(StrataError::Decode("XOR stream exhausted".into()));
        }
        let bits = if !self.started {
            self.started = true;
            self.bits(64)?
        } else if !self.bit()? {
            self.prev_bits
        } else {
            let (leading, meaningful) = if !self.bit()? {
                (self.prev_leading, 64 - self.prev_leading - self.prev_trailing)
            } else {
                let leading = self.bits(5)? as u32;
                let meaningful = self.bits(6)? as u32 + 1;
                self.prev_leading = leading;
                self.prev_trailing = 64 - leading - meaningful;
                (leading, meaningful)
            };
            let trailing = 64 - leading - meaningful;
            let xor = self.bits(meaningful as usize)? << trailing;
            self.prev_bits ^ xor
        };
        self.prev_bits = bits;
        self.remaining -= 1;
        Ok(TsValue::Double(f64::from_bits(bits)))
    }
}

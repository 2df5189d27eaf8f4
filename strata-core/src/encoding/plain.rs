//! Plain fixed-width codec honouring the chunk's byte order

use super::{Decoder, Encoder};
use crate::types::{DataType, Endianness, TsValue};
use crate::{Result, StrataError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Decoder for PLAIN-encoded columns
#[derive(Debug)]
pub struct PlainDecoder {
    data_type: DataType,
    endianness: Endianness,
}

impl PlainDecoder {
    /// Create a decoder for one column type
    pub fn new(data_type: DataType, endianness: Endianness) -> Self {
        Self {
            data_type,
            endianness,
        }
    }

    fn get_i32(&self, buf: &mut Bytes) -> i32 {
        match self.endianness {
            Endianness::Big => buf.get_i32(),
            Endianness::Little => buf.get_i32_le(),
        }
    }

    fn ensure(&self, buf: &Bytes, need: usize) -> Result<()> {
        if buf.remaining() < need {
            return Err(StrataError::Decode(format!(
                "plain decoder needs {} bytes, {} remain",
                need,
                buf.remaining()
            )));
        }
        Ok(())
    }
}

impl Decoder for PlainDecoder {
    fn reset(&mut self) {}

    fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    fn has_next(&mut self, buf: &mut Bytes) -> Result<bool> {
        Ok(buf.has_remaining())
    }

    fn next(&mut self, buf: &mut Bytes) -> Result<TsValue> {
        let value = match self.data_type {
            DataType::Bool => {
                self.ensure(buf, 1)?;
                TsValue::Bool(buf.get_u8() != 0)
            }
            DataType::Int32 => {
                self.ensure(buf, 4)?;
                TsValue::Int32(self.get_i32(buf))
            }
            DataType::Int64 => {
                self.ensure(buf, 8)?;
                TsValue::Int64(match self.endianness {
                    Endianness::Big => buf.get_i64(),
                    Endianness::Little => buf.get_i64_le(),
                })
            }
            DataType::Float => {
                self.ensure(buf, 4)?;
                TsValue::Float(match self.endianness {
                    Endianness::Big => buf.get_f32(),
                    Endianness::Little => buf.get_f32_le(),
                })
            }
            DataType::Double => {
                self.ensure(buf, 8)?;
                TsValue::Double(match self.endianness {
                    Endianness::Big => buf.get_f64(),
                    Endianness::Little => buf.get_f64_le(),
                })
            }
            DataType::Text => {
                self.ensure(buf, 4)?;
                let len = self.get_i32(buf);
                if len < 0 {
                    return Err(StrataError::Decode(format!("negative text length: {}", len)));
                }
                self.ensure(buf, len as usize)?;
                let raw = buf.copy_to_bytes(len as usize);
                TsValue::Text(String::from_utf8(raw.to_vec()).map_err(|e| {
                    StrataError::Decode(format!("invalid UTF-8 in text column: {}", e))
                })?)
            }
        };
        Ok(value)
    }
}

/// Encoder for PLAIN-encoded columns
#[derive(Debug)]
pub struct PlainEncoder {
    data_type: DataType,
    endianness: Endianness,
}

impl PlainEncoder {
    /// Create an encoder for one column type
    pub fn new(data_type: DataType, endianness: Endianness) -> Self {
        Self {
            data_type,
            endianness,
        }
    }

    fn put_i32(&self, buf: &mut BytesMut, v: i32) {
        match self.endianness {
            Endianness::Big => buf.put_i32(v),
            Endianness::Little => buf.put_i32_le(v),
        }
    }
}

impl Encoder for PlainEncoder {
    fn encode(&mut self, value: &TsValue, buf: &mut BytesMut) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(StrataError::Decode(format!(
                "plain encoder for {} got {}",
                self.data_type,
                value.data_type()
            )));
        }
        match value {
            TsValue::Bool(v) => buf.put_u8(*v as u8),
            TsValue::Int32(v) => self.put_i32(buf, *v),
            TsValue::Int64(v) => match self.endianness {
                Endianness::Big => buf.put_i64(*v),
                Endianness::Little => buf.put_i64_le(*v),
            },
            TsValue::Float(v) => match self.endianness {
                Endianness::Big => buf.put_f32(*v),
                Endianness::Little => buf.put_f32_le(*v),
            },
            TsValue::Double(v) => match self.endianness {
                Endianness::Big => buf.put_f64(*v),
                Endianness::Little => buf.put_f64_le(*v),
            },
            TsValue::Text(v) => {
                self.put_i32(buf, v.len() as i32);
                buf.put_slice(v.as_bytes());
            }
        }
        Ok(())
    }

    fn flush(&mut self, _buf: &mut BytesMut) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data_type: DataType, endianness: Endianness, values: Vec<TsValue>) {
        let mut encoder = PlainEncoder::new(data_type, endianness);
        let mut buf = BytesMut::new();
        for v in &values {
            encoder.encode(v, &mut buf).unwrap();
        }
        encoder.flush(&mut buf).unwrap();

        let mut decoder = PlainDecoder::new(data_type, endianness);
        let mut bytes = buf.freeze();
        let mut decoded = Vec::new();
        while decoder.has_next(&mut bytes).unwrap() {
            decoded.push(decoder.next(&mut bytes).unwrap());
        }
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_plain_both_byte_orders() {
        for endianness in [Endianness::Little, Endianness::Big] {
            roundtrip(
                DataType::Int64,
                endianness,
                vec![TsValue::Int64(-5), TsValue::Int64(i64::MAX)],
            );
            roundtrip(
                DataType::Double,
                endianness,
                vec![TsValue::Double(1.5), TsValue::Double(-0.25)],
            );
            roundtrip(
                DataType::Text,
                endianness,
                vec![TsValue::Text("hello".into()), TsValue::Text("".into())],
            );
        }
    }

    #[test]
    fn test_truncated_buffer_fails() {
        let mut decoder = PlainDecoder::new(DataType::Int64, Endianness::Little);
        let mut bytes = Bytes::from_static(&[1, 2, 3]);
        assert!(matches!(
            decoder.next(&mut bytes),
            Err(StrataError::Decode(_))
        ));
    }
}

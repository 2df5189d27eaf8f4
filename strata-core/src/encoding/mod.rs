//! Column encodings and the decoder/encoder plug-in points
//!
//! Each chunk names one value encoding; time columns always use the
//! engine-wide time encoding. Bit-packed codecs prefix their payload with
//! an `i32` point count so `has_next` stays exact despite byte padding.

mod bitstream;
mod gorilla;
mod plain;
mod twodiff;

pub use bitstream::{BitReader, BitWriter};
pub use gorilla::{GorillaDecoder, GorillaEncoder};
pub use plain::{PlainDecoder, PlainEncoder};
pub use twodiff::{TwoDiffDecoder, TwoDiffEncoder};

use crate::types::{DataType, Endianness, TsValue};
use crate::{Result, StrataError};
use bytes::{Bytes, BytesMut};

/// Column encoding of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Fixed-width values in the chunk's byte order
    #[default]
    Plain,
    /// Delta-of-delta over a bitstream; INT64 only
    TwoDiff,
    /// XOR of consecutive bit patterns over a bitstream; DOUBLE only
    Gorilla,
}

impl Encoding {
    /// Wire code of this encoding
    pub fn code(&self) -> u8 {
        match self {
            Encoding::Plain => 0,
            Encoding::TwoDiff => 4,
            Encoding::Gorilla => 6,
        }
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Encoding::Plain),
            4 => Ok(Encoding::TwoDiff),
            6 => Ok(Encoding::Gorilla),
            _ => Err(StrataError::CorruptChunk(format!(
                "unknown encoding code: {}",
                code
            ))),
        }
    }
}

/// Streaming decoder over one encoded column buffer.
///
/// A decoder is owned by one reader; `reset` returns it to its initial
/// state so a chunk reader can reuse it across pages.
pub trait Decoder {
    /// Drop all decoding state
    fn reset(&mut self);

    /// Set the byte order of fixed-width payloads
    fn set_endianness(&mut self, endianness: Endianness);

    /// True if the buffer holds at least one more value
    fn has_next(&mut self, buf: &mut Bytes) -> Result<bool>;

    /// Decode the next value
    fn next(&mut self, buf: &mut Bytes) -> Result<TsValue>;
}

/// Streaming encoder producing one encoded column buffer.
pub trait Encoder {
    /// Append one value
    fn encode(&mut self, value: &TsValue, buf: &mut BytesMut) -> Result<()>;

    /// Finalize the stream into `buf` and reset for reuse
    fn flush(&mut self, buf: &mut BytesMut) -> Result<()>;
}

/// Construct the decoder for an (encoding, type) pair
pub fn decoder_for(
    encoding: Encoding,
    data_type: DataType,
    endianness: Endianness,
) -> Result<Box<dyn Decoder>> {
    match (encoding, data_type) {
        (Encoding::Plain, _) => Ok(Box::new(PlainDecoder::new(data_type, endianness))),
        (Encoding::TwoDiff, DataType::Int64) => Ok(Box::new(TwoDiffDecoder::new())),
        (Encoding::Gorilla, DataType::Double) => Ok(Box::new(GorillaDecoder::new())),
        (encoding, data_type) => Err(StrataError::Decode(format!(
            "encoding {:?} does not support {}",
            encoding, data_type
        ))),
    }
}

/// Construct the encoder for an (encoding, type) pair
pub fn encoder_for(
    encoding: Encoding,
    data_type: DataType,
    endianness: Endianness,
) -> Result<Box<dyn Encoder>> {
    match (encoding, data_type) {
        (Encoding::Plain, _) => Ok(Box::new(PlainEncoder::new(data_type, endianness))),
        (Encoding::TwoDiff, DataType::Int64) => Ok(Box::new(TwoDiffEncoder::new())),
        (Encoding::Gorilla, DataType::Double) => Ok(Box::new(GorillaEncoder::new())),
        (encoding, data_type) => Err(StrataError::Decode(format!(
            "encoding {:?} does not support {}",
            encoding, data_type
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_codes() {
        for enc in [Encoding::Plain, Encoding::TwoDiff, Encoding::Gorilla] {
            assert_eq!(Encoding::from_code(enc.code()).unwrap(), enc);
        }
        assert!(Encoding::from_code(3).is_err());
    }

    #[test]
    fn test_unsupported_combination() {
        assert!(decoder_for(Encoding::Gorilla, DataType::Int32, Endianness::Little).is_err());
        assert!(encoder_for(Encoding::TwoDiff, DataType::Text, Endianness::Little).is_err());
    }
}

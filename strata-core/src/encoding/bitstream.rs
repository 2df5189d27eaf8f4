//! Bit-level I/O for the bit-packed column codecs

use bytes::Bytes;

/// Bit writer accumulating a byte buffer
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    current_byte: u8,
    bit_position: u8,
}

impl BitWriter {
    /// Create a new BitWriter
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single bit
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.current_byte |= 1 << (7 - self.bit_position);
        }
        self.bit_position += 1;

        if self.bit_position == 8 {
            self.buffer.push(self.current_byte);
            self.current_byte = 0;
            self.bit_position = 0;
        }
    }

    /// Write the low `num_bits` bits of a u64, most significant first
    #[inline]
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        debug_assert!(num_bits <= 64);

        for i in (0..num_bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Finish the trailing partial byte and return the buffer
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_position > 0 {
            self.buffer.push(self.current_byte);
        }
        self.buffer
    }

    /// Current size in bytes, counting a partial byte
    pub fn len(&self) -> usize {
        self.buffer.len() + usize::from(self.bit_position > 0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.bit_position == 0
    }
}

/// Bit reader over an owned payload
#[derive(Debug)]
pub struct BitReader {
    data: Bytes,
    byte_position: usize,
    bit_position: u8,
}

impl BitReader {
    /// Create a new BitReader over a payload
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            byte_position: 0,
            bit_position: 0,
        }
    }

    /// Read a single bit
    #[inline]
    pub fn read_bit(&mut self) -> Option<bool> {
        if self.byte_position >= self.data.len() {
            return None;
        }

        let bit = (self.data[self.byte_position] >> (7 - self.bit_position)) & 1 == 1;
        self.bit_position += 1;

        if self.bit_position == 8 {
            self.byte_position += 1;
            self.bit_position = 0;
        }

        Some(bit)
    }

    /// Read `num_bits` bits as a u64, most significant first
    #[inline]
    pub fn read_bits(&mut self, num_bits: usize) -> Option<u64> {
        debug_assert!(num_bits <= 64);

        let mut value = 0u64;
        for _ in 0..num_bits {
            let bit = self.read_bit()?;
            value = (value << 1) | (bit as u64);
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_reader() {
        let mut writer = BitWriter::new();

        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_bits(0b1010_1010, 8);
        writer.write_bits(0xFF, 8);

        let data = Bytes::from(writer.finish());

        let mut reader = BitReader::new(data);
        assert_eq!(reader.read_bit(), Some(true));
        assert_eq!(reader.read_bit(), Some(false));
        assert_eq!(reader.read_bit(), Some(true));
        assert_eq!(reader.read_bits(8), Some(0b1010_1010));
        assert_eq!(reader.read_bits(8), Some(0xFF));
    }

    #[test]
    fn test_write_read_various_sizes() {
        let mut writer = BitWriter::new();

        writer.write_bits(0b111, 3);
        writer.write_bits(0b10101, 5);
        writer.write_bits(0xABCD, 16);
        writer.write_bits(0xDEADBEEF, 32);

        let data = Bytes::from(writer.finish());

        let mut reader = BitReader::new(data);
        assert_eq!(reader.read_bits(3), Some(0b111));
        assert_eq!(reader.read_bits(5), Some(0b10101));
        assert_eq!(reader.read_bits(16), Some(0xABCD));
        assert_eq!(reader.read_bits(32), Some(0xDEADBEEF));
    }

    #[test]
    fn test_read_past_end() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1, 1);
        let mut reader = BitReader::new(Bytes::from(writer.finish()));
        assert_eq!(reader.read_bits(8), Some(0b1000_0000));
        assert_eq!(reader.read_bit(), None);
    }
}

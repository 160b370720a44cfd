use crate::error::{Result, TsError};

/// A bit-level reader over a byte slice, most significant bit first.
///
/// Used for codec configuration records such as the AAC
/// AudioSpecificConfig, where fields are not byte aligned.
///
/// Example:
/// ```
/// use tspackager::utils::BitReader;
///
/// let data = [0b1011_0011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011);
/// assert_eq!(reader.bits_left(), 4);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit. Returns an error at the end of data.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(TsError::Parser("reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads `n` bits (at most 32) as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(TsError::Parser("too many bits requested".into()));
        }
        if n as usize > self.bits_left() {
            return Err(TsError::Parser(format!(
                "requested {} bits with {} left",
                n,
                self.bits_left()
            )));
        }

        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u32;
        }

        Ok(value)
    }

    /// Skips `n` bits.
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        if n > self.bits_left() {
            return Err(TsError::Parser("skip past end of data".into()));
        }
        let position = self.position() + n;
        self.byte_offset = position / 8;
        self.bit_offset = (position % 8) as u8;
        Ok(())
    }

    /// Number of bits consumed so far.
    pub fn position(&self) -> usize {
        self.byte_offset * 8 + self.bit_offset as usize
    }

    pub fn bits_left(&self) -> usize {
        self.data.len() * 8 - self.position()
    }
}

//! # Utility Functions and Types
//!
//! Bit-level reading for codec configuration records and the MPEG-2 CRC32
//! used to seal PSI sections.
//!
//! ```rust
//! use tspackager::utils::{BitReader, Crc32Mpeg2};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(3)?, 0b101);
//!
//! let crc = Crc32Mpeg2::new();
//! println!("CRC32: {:08x}", crc.calculate(b"Hello, world!"));
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

pub use bits::BitReader;
pub use crc::Crc32Mpeg2;

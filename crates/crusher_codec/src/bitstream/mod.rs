//! # Bitstream
//!
//! MSB-first bit packing. Fields are laid end to end with no padding: the
//! last bit of one field is immediately followed by the first bit of the
//! next, and byte 0's top bit is the first bit written.

mod buffer;
pub mod word;

pub use buffer::BitBuffer;
pub use word::{extract, inject, read_bits, write_bits};

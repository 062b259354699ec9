//! Fixed-capacity bit buffer.

use crate::bitstream::word::{self, WORD_BITS};
use crate::error::{CrusherError, CrusherResult};

/// Bit-granular read/write buffer over 64-bit words.
///
/// Capacity is fixed at construction. Storage starts zeroed, so reading any
/// bit that was never written yields zero. Writing or reading past the
/// capacity is an error and never truncates.
///
/// Two access styles share the same storage:
///
/// - Sequential: [`write`](Self::write) / [`read`](Self::read) advance the
///   buffer's own cursors.
/// - Positional: [`write_at`](Self::write_at) / [`read_at`](Self::read_at)
///   take a bit position and return the next one, leaving the cursors alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitBuffer {
    words: Vec<u64>,
    capacity: usize,
    write_pos: usize,
    read_pos: usize,
    /// Highest bit position ever written.
    len: usize,
}

impl BitBuffer {
    /// Creates an empty buffer holding up to `capacity_bits` bits.
    #[must_use]
    pub fn with_capacity(capacity_bits: usize) -> Self {
        let word_count = capacity_bits.div_ceil(WORD_BITS as usize);
        Self {
            words: vec![0; word_count],
            capacity: capacity_bits,
            write_pos: 0,
            read_pos: 0,
            len: 0,
        }
    }

    /// Creates a buffer holding a copy of `bytes`, ready for reading.
    ///
    /// Capacity and length are both `bytes.len() * 8`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(bytes.len() * 8);
        buffer.load_bytes(bytes);
        buffer.len = buffer.capacity;
        buffer
    }

    /// Capacity in bits.
    #[must_use]
    pub const fn capacity_bits(&self) -> usize {
        self.capacity
    }

    /// Highest bit position written so far.
    #[must_use]
    pub const fn len_bits(&self) -> usize {
        self.len
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes needed to hold the written bits.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.len.div_ceil(8)
    }

    /// Sequential write cursor.
    #[must_use]
    pub const fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Sequential read cursor.
    #[must_use]
    pub const fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Bits between the read cursor and the end of the written data.
    #[must_use]
    pub const fn remaining_bits(&self) -> usize {
        self.len.saturating_sub(self.read_pos)
    }

    /// Moves the read cursor.
    ///
    /// # Errors
    ///
    /// `Capacity` if `pos` is past the capacity.
    pub fn seek_read(&mut self, pos: usize) -> CrusherResult<()> {
        self.check(pos, 0)?;
        self.read_pos = pos;
        Ok(())
    }

    /// Moves the write cursor.
    ///
    /// # Errors
    ///
    /// `Capacity` if `pos` is past the capacity.
    pub fn seek_write(&mut self, pos: usize) -> CrusherResult<()> {
        self.check(pos, 0)?;
        self.write_pos = pos;
        Ok(())
    }

    /// Clears all bits and rewinds both cursors.
    pub fn reset(&mut self) {
        self.words.fill(0);
        self.write_pos = 0;
        self.read_pos = 0;
        self.len = 0;
    }

    /// Writes the low `bits` bits of `value` at the write cursor.
    ///
    /// # Errors
    ///
    /// `Capacity` if the field does not fit. The cursor does not move.
    pub fn write(&mut self, value: u64, bits: u32) -> CrusherResult<()> {
        self.write_pos = self.write_at(value, bits, self.write_pos)?;
        Ok(())
    }

    /// Reads `bits` bits at the read cursor.
    ///
    /// # Errors
    ///
    /// `Capacity` if the field runs past the capacity. The cursor does not move.
    pub fn read(&mut self, bits: u32) -> CrusherResult<u64> {
        let (value, next) = self.read_at(bits, self.read_pos)?;
        self.read_pos = next;
        Ok(value)
    }

    /// Writes the low `bits` bits of `value` at `pos`.
    ///
    /// Returns the position after the field.
    ///
    /// # Errors
    ///
    /// `Capacity` if `bits > 64` or the field runs past the capacity.
    pub fn write_at(&mut self, value: u64, bits: u32, pos: usize) -> CrusherResult<usize> {
        self.check(pos, bits)?;
        if bits == 0 {
            return Ok(pos);
        }

        let index = pos / WORD_BITS as usize;
        let offset = (pos % WORD_BITS as usize) as u32;
        let value = value & word::low_mask(bits);

        // Leading part fills the current word, any remainder starts the next
        let first = (WORD_BITS - offset).min(bits);
        let rest = bits - first;
        word::inject(&mut self.words[index], value >> rest, first, offset)?;
        if rest > 0 {
            word::inject(&mut self.words[index + 1], value, rest, 0)?;
        }

        let end = pos + bits as usize;
        self.len = self.len.max(end);
        Ok(end)
    }

    /// Reads `bits` bits at `pos`.
    ///
    /// Returns the value and the position after the field.
    ///
    /// # Errors
    ///
    /// `Capacity` if `bits > 64` or the field runs past the capacity.
    pub fn read_at(&self, bits: u32, pos: usize) -> CrusherResult<(u64, usize)> {
        self.check(pos, bits)?;
        if bits == 0 {
            return Ok((0, pos));
        }

        let index = pos / WORD_BITS as usize;
        let offset = (pos % WORD_BITS as usize) as u32;

        let first = (WORD_BITS - offset).min(bits);
        let rest = bits - first;
        let mut value = word::extract(self.words[index], first, offset)?;
        if rest > 0 {
            value = (value << rest) | word::extract(self.words[index + 1], rest, 0)?;
        }

        Ok((value, pos + bits as usize))
    }

    /// Copies the written bits out as bytes, most significant bit first.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.byte_len()];
        self.copy_bytes(&mut out);
        out
    }

    /// Copies the written bits into `out`, returning the number of bytes used.
    ///
    /// # Errors
    ///
    /// `Capacity` if `out` is shorter than [`byte_len`](Self::byte_len).
    pub fn write_to_bytes(&self, out: &mut [u8]) -> CrusherResult<usize> {
        let needed = self.byte_len();
        if out.len() < needed {
            return Err(CrusherError::Capacity { requested: self.len, capacity: out.len() * 8 });
        }
        self.copy_bytes(&mut out[..needed]);
        Ok(needed)
    }

    /// Replaces the contents with `bytes` and rewinds both cursors.
    ///
    /// # Errors
    ///
    /// `Capacity` if `bytes` holds more bits than the buffer.
    pub fn read_from_bytes(&mut self, bytes: &[u8]) -> CrusherResult<()> {
        let bits = bytes.len() * 8;
        if bits > self.capacity {
            return Err(CrusherError::Capacity { requested: bits, capacity: self.capacity });
        }
        self.reset();
        self.load_bytes(bytes);
        self.len = bits;
        Ok(())
    }

    /// Raw storage words.
    #[must_use]
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    fn check(&self, pos: usize, bits: u32) -> CrusherResult<()> {
        let requested = pos.saturating_add(bits as usize);
        if bits > WORD_BITS || requested > self.capacity {
            return Err(CrusherError::Capacity { requested, capacity: self.capacity });
        }
        Ok(())
    }

    fn copy_bytes(&self, out: &mut [u8]) {
        for (chunk, word) in out.chunks_mut(8).zip(&self.words) {
            let be = word.to_be_bytes();
            chunk.copy_from_slice(&be[..chunk.len()]);
        }
    }

    fn load_bytes(&mut self, bytes: &[u8]) {
        for (word, chunk) in self.words.iter_mut().zip(bytes.chunks(8)) {
            let mut be = [0u8; 8];
            be[..chunk.len()].copy_from_slice(chunk);
            *word = u64::from_be_bytes(be);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_at_offset_three() {
        let mut buffer = BitBuffer::with_capacity(64);
        let next = buffer.write_at(0b10110, 5, 3).unwrap();
        assert_eq!(next, 8);

        let (value, next) = buffer.read_at(5, 3).unwrap();
        assert_eq!(value, 0b10110);
        assert_eq!(next, 8);
        // Positional access leaves the cursors alone
        assert_eq!(buffer.write_pos(), 0);
        assert_eq!(buffer.read_pos(), 0);
    }

    #[test]
    fn test_sequential_fields_pack_without_padding() {
        let mut buffer = BitBuffer::with_capacity(128);
        buffer.write(0b101, 3).unwrap();
        buffer.write(0x7F, 7).unwrap();
        buffer.write(1, 1).unwrap();
        assert_eq!(buffer.write_pos(), 11);
        assert_eq!(buffer.len_bits(), 11);

        let bytes = buffer.to_bytes();
        assert_eq!(bytes.len(), 2);
        assert_eq!(bytes[0], 0b1011_1111);
        assert_eq!(bytes[1], 0b1110_0000);

        assert_eq!(buffer.read(3).unwrap(), 0b101);
        assert_eq!(buffer.read(7).unwrap(), 0x7F);
        assert_eq!(buffer.read(1).unwrap(), 1);
        assert_eq!(buffer.remaining_bits(), 0);
    }

    #[test]
    fn test_field_spanning_words() {
        let mut buffer = BitBuffer::with_capacity(128);
        buffer.write_at(0x1234_5678_9ABC, 48, 40).unwrap();
        assert_eq!(buffer.read_at(48, 40).unwrap().0, 0x1234_5678_9ABC);
        assert_eq!(buffer.read_at(40, 0).unwrap().0, 0);

        buffer.write_at(u64::MAX, 64, 60).unwrap();
        assert_eq!(buffer.read_at(64, 60).unwrap().0, u64::MAX);
    }

    #[test]
    fn test_unwritten_bits_read_zero() {
        let buffer = BitBuffer::with_capacity(256);
        assert_eq!(buffer.read_at(64, 100).unwrap().0, 0);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut buffer = BitBuffer::with_capacity(10);
        buffer.write(0x3FF, 10).unwrap();
        let err = buffer.write(1, 1).unwrap_err();
        assert_eq!(err, CrusherError::Capacity { requested: 11, capacity: 10 });
        assert_eq!(buffer.write_pos(), 10);

        assert!(buffer.read_at(4, 8).is_err());
        assert!(buffer.write_at(0, 65, 0).is_err());
    }

    #[test]
    fn test_byte_roundtrip() {
        let mut buffer = BitBuffer::with_capacity(96);
        buffer.write(0xABC, 12).unwrap();
        buffer.write(0x3, 2).unwrap();

        let bytes = buffer.to_bytes();
        let mut received = BitBuffer::from_bytes(&bytes);
        assert_eq!(received.read(12).unwrap(), 0xABC);
        assert_eq!(received.read(2).unwrap(), 0x3);

        let mut out = [0u8; 1];
        assert!(buffer.write_to_bytes(&mut out).is_err());
        let mut out = [0u8; 4];
        assert_eq!(buffer.write_to_bytes(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], &bytes[..]);
    }

    #[test]
    fn test_read_from_bytes_resets() {
        let mut buffer = BitBuffer::with_capacity(64);
        buffer.write(0xFF, 8).unwrap();
        buffer.read_from_bytes(&[0x0F]).unwrap();
        assert_eq!(buffer.len_bits(), 8);
        assert_eq!(buffer.read(8).unwrap(), 0x0F);
        assert!(buffer.read_from_bytes(&[0u8; 9]).is_err());
    }
}

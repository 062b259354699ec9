//! Bit packing on caller-owned storage.
//!
//! These helpers never allocate. Positions count from the most significant
//! bit: position 0 of a word is bit 63, position 0 of a byte slice is the top
//! bit of byte 0.

use crate::error::{CrusherError, CrusherResult};

/// Bits in one storage word.
pub const WORD_BITS: u32 = 64;

/// Mask with the low `bits` bits set. Safe for 0 and 64.
#[inline]
#[must_use]
pub const fn low_mask(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else if bits >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Writes the low `bits` bits of `value` into `word` at `pos`.
///
/// Returns the position after the written field.
///
/// # Errors
///
/// `Capacity` if `pos + bits` exceeds 64.
#[inline]
pub fn inject(word: &mut u64, value: u64, bits: u32, pos: u32) -> CrusherResult<u32> {
    let end = pos as usize + bits as usize;
    if end > WORD_BITS as usize {
        return Err(CrusherError::Capacity { requested: end, capacity: WORD_BITS as usize });
    }
    if bits == 0 {
        return Ok(pos);
    }

    let shift = WORD_BITS - pos - bits;
    let mask = low_mask(bits) << shift;
    *word = (*word & !mask) | ((value & low_mask(bits)) << shift);
    Ok(pos + bits)
}

/// Reads `bits` bits from `word` at `pos`.
///
/// # Errors
///
/// `Capacity` if `pos + bits` exceeds 64.
#[inline]
pub fn extract(word: u64, bits: u32, pos: u32) -> CrusherResult<u64> {
    let end = pos as usize + bits as usize;
    if end > WORD_BITS as usize {
        return Err(CrusherError::Capacity { requested: end, capacity: WORD_BITS as usize });
    }
    if bits == 0 {
        return Ok(0);
    }

    let shift = WORD_BITS - pos - bits;
    Ok((word >> shift) & low_mask(bits))
}

/// Writes the low `bits` bits of `value` into `bytes` at bit position `pos`.
///
/// Returns the position after the written field.
///
/// # Errors
///
/// `Capacity` if the field runs past the end of the slice, or `bits > 64`.
pub fn write_bits(bytes: &mut [u8], value: u64, bits: u32, pos: usize) -> CrusherResult<usize> {
    check_slice(bytes.len(), bits, pos)?;

    for i in 0..bits as usize {
        let bit = (value >> (bits as usize - 1 - i)) & 1;
        let at = pos + i;
        let byte_mask = 0x80u8 >> (at % 8);
        if bit == 1 {
            bytes[at / 8] |= byte_mask;
        } else {
            bytes[at / 8] &= !byte_mask;
        }
    }

    Ok(pos + bits as usize)
}

/// Reads `bits` bits from `bytes` at bit position `pos`.
///
/// # Errors
///
/// `Capacity` if the field runs past the end of the slice, or `bits > 64`.
pub fn read_bits(bytes: &[u8], bits: u32, pos: usize) -> CrusherResult<u64> {
    check_slice(bytes.len(), bits, pos)?;

    let mut value = 0u64;
    for i in 0..bits as usize {
        let at = pos + i;
        let bit = (bytes[at / 8] >> (7 - at % 8)) & 1;
        value = (value << 1) | u64::from(bit);
    }
    Ok(value)
}

fn check_slice(len: usize, bits: u32, pos: usize) -> CrusherResult<()> {
    let capacity = len * 8;
    let requested = pos.saturating_add(bits as usize);
    if bits > WORD_BITS || requested > capacity {
        return Err(CrusherError::Capacity { requested, capacity });
    }
    Ok(())
}

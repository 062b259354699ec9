//! Bit culling levels.
//!
//! A culled update transmits only the low bits of each code. The receiver
//! rebuilds the dropped upper bits from the last code it knows for that axis.

use serde::{Deserialize, Serialize};

use crate::bitstream::word::low_mask;

/// How many upper bits a delta update leaves out. Ordered finest to coarsest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BitCullingLevel {
    /// Every bit is sent.
    #[default]
    NoCulling,
    /// The top third of the bits is left out.
    DropThird,
    /// The top half of the bits is left out.
    DropHalf,
    /// Nothing is sent; the receiver keeps its value.
    DropAll,
}

impl BitCullingLevel {
    /// All levels, finest first.
    pub const ALL: [Self; 4] = [Self::NoCulling, Self::DropThird, Self::DropHalf, Self::DropAll];

    /// Table index of this level.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bits sent at this level for a field of `full_bits`.
    #[must_use]
    pub const fn retained_bits(self, full_bits: u32) -> u32 {
        match self {
            Self::NoCulling => full_bits,
            Self::DropThird => full_bits - full_bits / 3,
            Self::DropHalf => full_bits - full_bits / 2,
            Self::DropAll => 0,
        }
    }

    /// Levels from `self` down to `NoCulling`, coarsest first.
    pub fn coarsest_first(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().rev().filter(move |level| *level <= self)
    }
}

/// Number of significant bits in `a ^ b`; 0 when equal.
///
/// Every bit at or above this position is shared by `a` and `b`.
#[inline]
#[must_use]
pub const fn highest_different_bit(a: u64, b: u64) -> u32 {
    64 - (a ^ b).leading_zeros()
}

/// Returns true if `a` and `b` agree on every bit above the low `low_bits`.
#[inline]
#[must_use]
pub const fn upper_bits_match(a: u64, b: u64, low_bits: u32) -> bool {
    (a & !low_mask(low_bits)) == (b & !low_mask(low_bits))
}

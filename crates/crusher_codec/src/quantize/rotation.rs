//! # Rotation Quantizer
//!
//! Packs a unit quaternion into at most 64 bits.
//!
//! ## Smallest-three layout
//!
//! `[selector:2][a:w][b:w][c:w]`, MSB first, where the selector names the
//! dropped (largest) component as `0=x, 1=y, 2=z, 3=w` and `a, b, c` are the
//! remaining components in `x, y, z, w` order. Each is signed fixed point over
//! `[-1/√2, 1/√2]`, mapped onto `0..=2^w - 1`.
//!
//! The sign is flipped before packing so the dropped component is positive;
//! `q` and `-q` are the same rotation, so decoding rebuilds it as
//! `sqrt(1 - a² - b² - c²)`.

use std::f64::consts::SQRT_2;
use std::hash::{Hash, Hasher};

use half::f16;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crusher_shared::Quaternion;

use crate::bitstream::word::low_mask;
use crate::error::{CrusherError, CrusherResult};
use crate::quantize::culling::BitCullingLevel;

/// Selector bits in front of a smallest-three code.
pub const SELECTOR_BITS: u32 = 2;

/// Smallest accepted budget: selector plus one bit per component.
pub const MIN_ROTATION_BITS: u32 = SELECTOR_BITS + 3;

/// Largest accepted budget.
pub const MAX_ROTATION_BITS: u32 = 64;

/// Bits used by [`RotationEncoding::HalfFloat`].
const HALF_FLOAT_ROTATION_BITS: u32 = 64;

/// How a quaternion is packed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationEncoding {
    /// Selector plus three fixed-point components.
    #[default]
    SmallestThree,
    /// All four components as IEEE half floats, 64 bits.
    HalfFloat,
}

/// Mutable setup view of a [`RotationQuantizer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RotationQuantizerBuilder {
    /// Packing variant.
    pub encoding: RotationEncoding,
    /// Total budget for smallest-three.
    pub bits: u32,
}

impl RotationQuantizerBuilder {
    /// Smallest-three with the given budget.
    #[must_use]
    pub const fn smallest_three(bits: u32) -> Self {
        Self { encoding: RotationEncoding::SmallestThree, bits }
    }

    /// Four half floats.
    #[must_use]
    pub const fn half_float() -> Self {
        Self { encoding: RotationEncoding::HalfFloat, bits: HALF_FLOAT_ROTATION_BITS }
    }

    /// Validates the budget.
    ///
    /// A smallest-three budget that is not `2 + 3k` is rounded down to one.
    ///
    /// # Errors
    ///
    /// `InvalidRotationBits` outside `5..=64`.
    pub fn build(self) -> CrusherResult<RotationQuantizer> {
        match self.encoding {
            RotationEncoding::HalfFloat => Ok(RotationQuantizer {
                encoding: RotationEncoding::HalfFloat,
                component_bits: 16,
                bits: HALF_FLOAT_ROTATION_BITS,
            }),
            RotationEncoding::SmallestThree => {
                if !(MIN_ROTATION_BITS..=MAX_ROTATION_BITS).contains(&self.bits) {
                    return Err(CrusherError::InvalidRotationBits {
                        bits: self.bits,
                        min: MIN_ROTATION_BITS,
                        max: MAX_ROTATION_BITS,
                    });
                }

                let component_bits = (self.bits - SELECTOR_BITS) / 3;
                let bits = SELECTOR_BITS + 3 * component_bits;
                if bits != self.bits {
                    debug!("Rotation budget {} rounded down to {}", self.bits, bits);
                }

                Ok(RotationQuantizer { encoding: RotationEncoding::SmallestThree, component_bits, bits })
            }
        }
    }
}

impl Default for RotationQuantizerBuilder {
    fn default() -> Self {
        Self::smallest_three(32)
    }
}

/// Compiled rotation quantizer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RotationQuantizer {
    encoding: RotationEncoding,
    component_bits: u32,
    bits: u32,
}

impl RotationQuantizer {
    /// Smallest-three quantizer with the given budget.
    ///
    /// # Errors
    ///
    /// `InvalidRotationBits` outside `5..=64`.
    pub fn smallest_three(bits: u32) -> CrusherResult<Self> {
        RotationQuantizerBuilder::smallest_three(bits).build()
    }

    /// Editable copy of the settings.
    #[must_use]
    pub const fn to_builder(&self) -> RotationQuantizerBuilder {
        RotationQuantizerBuilder { encoding: self.encoding, bits: self.bits }
    }

    /// Packing variant.
    #[must_use]
    pub const fn encoding(&self) -> RotationEncoding {
        self.encoding
    }

    /// Bits per retained component.
    #[must_use]
    pub const fn component_bits(&self) -> u32 {
        self.component_bits
    }

    /// Bits sent at `level`. Rotations are never partially culled.
    #[must_use]
    pub const fn bit_count(&self, level: BitCullingLevel) -> u32 {
        match level {
            BitCullingLevel::DropAll => 0,
            _ => self.bits,
        }
    }

    /// Packs `rotation`. The input is normalized first.
    #[must_use]
    pub fn encode(&self, rotation: Quaternion) -> u64 {
        let q = canonical(rotation.normalize());
        match self.encoding {
            RotationEncoding::HalfFloat => q
                .to_array()
                .iter()
                .fold(0u64, |acc, c| (acc << 16) | u64::from(f16::from_f32(*c).to_bits())),
            RotationEncoding::SmallestThree => {
                let components = q.to_array();
                let dropped = largest_index(components);
                let w = self.component_bits;
                let max = low_mask(w) as f64;

                let mut code = dropped as u64;
                for (i, c) in components.iter().enumerate() {
                    if i == dropped {
                        continue;
                    }
                    let t = (f64::from(*c) * SQRT_2 + 1.0) * 0.5;
                    let value = (t * max).round().clamp(0.0, max) as u64;
                    code = (code << w) | value;
                }
                code
            }
        }
    }

    /// Unpacks a code into a unit quaternion with the largest component positive.
    #[must_use]
    pub fn decode(&self, code: u64) -> Quaternion {
        match self.encoding {
            RotationEncoding::HalfFloat => {
                let c = |shift: u32| f16::from_bits((code >> shift) as u16).to_f32();
                Quaternion::new(c(48), c(32), c(16), c(0)).normalize()
            }
            RotationEncoding::SmallestThree => {
                let w = self.component_bits;
                let max = low_mask(w) as f64;
                let dropped = ((code >> (3 * w)) & 0b11) as usize;

                let mut kept = [0.0f64; 3];
                for (slot, value) in kept.iter_mut().enumerate() {
                    let shift = w * (2 - slot as u32);
                    let raw = ((code >> shift) & low_mask(w)) as f64;
                    *value = (raw / max * 2.0 - 1.0) / SQRT_2;
                }
                let sum: f64 = kept.iter().map(|v| v * v).sum();
                let largest = (1.0 - sum).max(0.0).sqrt();

                let mut components = [0.0f32; 4];
                let mut next = kept.iter();
                for (i, out) in components.iter_mut().enumerate() {
                    *out = if i == dropped {
                        largest as f32
                    } else {
                        next.next().copied().unwrap_or(0.0) as f32
                    };
                }
                Quaternion::from_array(components).normalize()
            }
        }
    }

    /// Packs `rotation` into a record tied to this quantizer.
    #[must_use]
    pub fn compress(&self, rotation: Quaternion) -> CompressedRotation<'_> {
        CompressedRotation { quantizer: self, code: self.encode(rotation) }
    }

    /// Wraps a code received from elsewhere.
    #[must_use]
    pub const fn from_code(&self, code: u64) -> CompressedRotation<'_> {
        CompressedRotation { quantizer: self, code }
    }
}

/// Index of the component with the largest magnitude; the first one wins ties.
fn largest_index(components: [f32; 4]) -> usize {
    let mut best = 0;
    for i in 1..4 {
        if components[i].abs() > components[best].abs() {
            best = i;
        }
    }
    best
}

/// Flips the sign so the largest component is positive.
fn canonical(q: Quaternion) -> Quaternion {
    let components = q.to_array();
    if components[largest_index(components)] < 0.0 {
        -q
    } else {
        q
    }
}

/// A packed rotation paired with its quantizer.
#[derive(Clone, Copy, Debug)]
pub struct CompressedRotation<'q> {
    quantizer: &'q RotationQuantizer,
    code: u64,
}

impl<'q> CompressedRotation<'q> {
    /// The packed code.
    #[must_use]
    pub const fn code(&self) -> u64 {
        self.code
    }

    /// Code width.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.quantizer.bits
    }

    /// Producing quantizer.
    #[must_use]
    pub const fn quantizer(&self) -> &'q RotationQuantizer {
        self.quantizer
    }

    /// Unpacks the rotation.
    #[must_use]
    pub fn decompress(&self) -> Quaternion {
        self.quantizer.decode(self.code)
    }
}

impl PartialEq for CompressedRotation<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for CompressedRotation<'_> {}

impl Hash for CompressedRotation<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

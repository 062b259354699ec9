//! # Scalar Quantizer
//!
//! Maps one float onto an unsigned code of a configured width.
//!
//! ## Encoding
//!
//! Linear policies clamp the value into `[min, max]` and map it onto
//! `0..=2^bits - 1`, rounding half away from zero. Both endpoints hit the
//! extreme codes exactly, so `[-20, 20]` at 12 bits sends `0.0` as `2048`.
//!
//! `HalfFloat` and `Uncompressed` store the IEEE bit pattern and do not clamp.
//!
//! ## Culling
//!
//! A culled field carries only its low bits. [`ScalarQuantizer::guess_upper_bits`]
//! rebuilds the full code from the receiver's previous code by picking the
//! candidate closest to it. A candidate farther than half a step away means
//! the value moved too far for that level, which is reported as `Desync`.

use std::hash::{Hash, Hasher};

use half::f16;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crusher_shared::math::wrap_degrees;
use crusher_shared::Axis;

use crate::bitstream::word::low_mask;
use crate::bitstream::BitBuffer;
use crate::error::{CrusherError, CrusherResult};
use crate::quantize::culling::{self, BitCullingLevel};

/// Widest code a linear policy may produce.
pub const MAX_SCALAR_BITS: u32 = 32;

/// Width of the half-float policy.
const HALF_FLOAT_BITS: u32 = 16;

/// Width of the uncompressed policy.
const UNCOMPRESSED_BITS: u32 = 32;

/// Inclusive value range of an axis.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl Range {
    /// Creates a range, rejecting `min > max` and non-finite bounds.
    ///
    /// # Errors
    ///
    /// `InvalidRange` for a reversed or non-finite range, or one whose width
    /// overflows `f32`.
    pub fn new(min: f32, max: f32) -> CrusherResult<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    fn validate(self) -> CrusherResult<()> {
        if !self.min.is_finite()
            || !self.max.is_finite()
            || self.min > self.max
            || !self.width().is_finite()
        {
            return Err(CrusherError::InvalidRange { min: self.min, max: self.max });
        }
        Ok(())
    }

    /// `max - min`.
    #[must_use]
    pub fn width(self) -> f32 {
        self.max - self.min
    }

    /// Centre of the range.
    #[must_use]
    pub fn midpoint(self) -> f32 {
        (self.min + self.max) * 0.5
    }

    /// Clamps `value` into the range.
    #[must_use]
    pub fn clamp(self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.min.to_bits() == other.min.to_bits() && self.max.to_bits() == other.max.to_bits()
    }
}

impl Eq for Range {}

impl Hash for Range {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min.to_bits().hash(state);
        self.max.to_bits().hash(state);
    }
}

/// How a scalar's width is chosen.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitWidthPolicy {
    /// Exactly this many bits, `1..=32`.
    FixedBits(u32),
    /// Enough bits that neighbouring codes are at most this far apart.
    Resolution(f32),
    /// IEEE half precision, 16 bits.
    HalfFloat,
    /// Full `f32` bit pattern, 32 bits.
    Uncompressed,
    /// Never written; decodes to the range minimum.
    Disabled,
}

impl BitWidthPolicy {
    /// Returns true for policies that map a range linearly onto codes.
    #[must_use]
    pub const fn is_linear(self) -> bool {
        matches!(self, Self::FixedBits(_) | Self::Resolution(_))
    }
}

impl PartialEq for BitWidthPolicy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::FixedBits(a), Self::FixedBits(b)) => a == b,
            (Self::Resolution(a), Self::Resolution(b)) => a.to_bits() == b.to_bits(),
            (Self::HalfFloat, Self::HalfFloat)
            | (Self::Uncompressed, Self::Uncompressed)
            | (Self::Disabled, Self::Disabled) => true,
            _ => false,
        }
    }
}

impl Eq for BitWidthPolicy {}

impl Hash for BitWidthPolicy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::FixedBits(bits) => bits.hash(state),
            Self::Resolution(step) => step.to_bits().hash(state),
            Self::HalfFloat | Self::Uncompressed | Self::Disabled => {}
        }
    }
}

/// What a scalar measures. Rotation axes wrap instead of clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrsKind {
    /// Linear distance.
    #[default]
    Position,
    /// Angle in degrees.
    Rotation,
    /// Scale factor.
    Scale,
}

/// Mutable setup view of a [`ScalarQuantizer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarQuantizerBuilder {
    /// Axis tag carried into errors and logs.
    pub axis: Axis,
    /// Semantic kind.
    pub kind: TrsKind,
    /// Value range.
    pub range: Range,
    /// Width policy.
    pub policy: BitWidthPolicy,
}

impl ScalarQuantizerBuilder {
    /// Starts a builder with the given range and policy.
    #[must_use]
    pub const fn new(min: f32, max: f32, policy: BitWidthPolicy) -> Self {
        Self {
            axis: Axis::X,
            kind: TrsKind::Position,
            range: Range { min, max },
            policy,
        }
    }

    /// A disabled axis.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0.0, 0.0, BitWidthPolicy::Disabled)
    }

    /// Sets the axis tag.
    #[must_use]
    pub fn axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    /// Sets the semantic kind.
    #[must_use]
    pub fn kind(mut self, kind: TrsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the range.
    #[must_use]
    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.range = Range { min, max };
        self
    }

    /// Sets the width policy.
    #[must_use]
    pub fn policy(mut self, policy: BitWidthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validates the settings and computes the bit table.
    ///
    /// # Errors
    ///
    /// `InvalidRange`, `InvalidBitWidth` or `InvalidResolution`.
    pub fn build(self) -> CrusherResult<ScalarQuantizer> {
        if !matches!(self.policy, BitWidthPolicy::Disabled) {
            self.range.validate()?;
        }

        let full = match self.policy {
            BitWidthPolicy::FixedBits(bits) => {
                if bits == 0 || bits > MAX_SCALAR_BITS {
                    return Err(CrusherError::InvalidBitWidth { bits, max: MAX_SCALAR_BITS });
                }
                bits
            }
            BitWidthPolicy::Resolution(step) => resolution_bits(self.range, step)?,
            BitWidthPolicy::HalfFloat => HALF_FLOAT_BITS,
            BitWidthPolicy::Uncompressed => UNCOMPRESSED_BITS,
            BitWidthPolicy::Disabled => 0,
        };

        let bits = BitCullingLevel::ALL.map(|level| {
            if self.policy.is_linear() || level == BitCullingLevel::DropAll {
                level.retained_bits(full)
            } else {
                // Float bit patterns do not survive partial culling
                full
            }
        });

        debug!(
            "Scalar {:?} compiled: {:?} [{}, {}] -> bits {:?}",
            self.axis, self.policy, self.range.min, self.range.max, bits
        );

        Ok(ScalarQuantizer {
            axis: self.axis,
            kind: self.kind,
            range: self.range,
            policy: self.policy,
            bits,
        })
    }
}

impl Default for ScalarQuantizerBuilder {
    fn default() -> Self {
        Self::new(-20.0, 20.0, BitWidthPolicy::FixedBits(12))
    }
}

/// Bits needed so adjacent codes are at most `step` apart.
fn resolution_bits(range: Range, step: f32) -> CrusherResult<u32> {
    if !step.is_finite() || step <= 0.0 {
        return Err(CrusherError::InvalidResolution(step));
    }

    let steps = (f64::from(range.width()) / f64::from(step)).ceil();
    if steps >= f64::from(u32::MAX) {
        return Err(CrusherError::InvalidResolution(step));
    }

    let bits = 64 - (steps as u64).leading_zeros();
    if bits > MAX_SCALAR_BITS {
        return Err(CrusherError::InvalidResolution(step));
    }
    Ok(bits)
}

/// Compiled, immutable scalar quantizer.
///
/// Safe to share across threads; every method takes `&self`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScalarQuantizer {
    axis: Axis,
    kind: TrsKind,
    range: Range,
    policy: BitWidthPolicy,
    bits: [u32; 4],
}

impl ScalarQuantizer {
    /// Shorthand for a fixed-width quantizer.
    ///
    /// # Errors
    ///
    /// See [`ScalarQuantizerBuilder::build`].
    pub fn fixed(min: f32, max: f32, bits: u32) -> CrusherResult<Self> {
        ScalarQuantizerBuilder::new(min, max, BitWidthPolicy::FixedBits(bits)).build()
    }

    /// Shorthand for a resolution-derived quantizer.
    ///
    /// # Errors
    ///
    /// See [`ScalarQuantizerBuilder::build`].
    pub fn with_resolution(min: f32, max: f32, step: f32) -> CrusherResult<Self> {
        ScalarQuantizerBuilder::new(min, max, BitWidthPolicy::Resolution(step)).build()
    }

    /// Editable copy of the settings.
    #[must_use]
    pub const fn to_builder(&self) -> ScalarQuantizerBuilder {
        ScalarQuantizerBuilder {
            axis: self.axis,
            kind: self.kind,
            range: self.range,
            policy: self.policy,
        }
    }

    /// Axis tag.
    #[must_use]
    pub const fn axis(&self) -> Axis {
        self.axis
    }

    /// Semantic kind.
    #[must_use]
    pub const fn kind(&self) -> TrsKind {
        self.kind
    }

    /// Value range.
    #[must_use]
    pub const fn range(&self) -> Range {
        self.range
    }

    /// Width policy.
    #[must_use]
    pub const fn policy(&self) -> BitWidthPolicy {
        self.policy
    }

    /// Bits sent at `level`.
    #[inline]
    #[must_use]
    pub const fn bit_count(&self, level: BitCullingLevel) -> u32 {
        self.bits[level.index()]
    }

    /// Returns true if the axis is ever written.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.bits[0] > 0
    }

    /// Largest code this quantizer produces.
    #[must_use]
    pub const fn max_code(&self) -> u64 {
        low_mask(self.bits[0])
    }

    /// Brings `value` into the encodable domain.
    ///
    /// Rotation axes first wrap into the 360° window centred on the range,
    /// then clamp. Float policies pass values through.
    #[must_use]
    pub fn clamp(&self, value: f32) -> f32 {
        if !self.policy.is_linear() {
            return value;
        }
        match self.kind {
            TrsKind::Rotation => {
                let wrapped = wrap_degrees(value, self.range.midpoint() - 180.0);
                self.range.clamp(wrapped)
            }
            TrsKind::Position | TrsKind::Scale => self.range.clamp(value),
        }
    }

    /// Quantizes `value` into a code.
    #[must_use]
    pub fn encode(&self, value: f32) -> u64 {
        match self.policy {
            BitWidthPolicy::Disabled => 0,
            BitWidthPolicy::HalfFloat => u64::from(f16::from_f32(value).to_bits()),
            BitWidthPolicy::Uncompressed => u64::from(value.to_bits()),
            BitWidthPolicy::FixedBits(_) | BitWidthPolicy::Resolution(_) => {
                let max_code = self.max_code();
                let width = f64::from(self.range.width());
                if max_code == 0 || width <= 0.0 {
                    return 0;
                }
                let clamped = f64::from(self.clamp(value));
                let t = (clamped - f64::from(self.range.min)) / width;
                // f64::round rounds half away from zero
                let code = (t * max_code as f64).round();
                (code.max(0.0) as u64).min(max_code)
            }
        }
    }

    /// Maps a code back onto a value.
    #[must_use]
    pub fn decode(&self, code: u64) -> f32 {
        match self.policy {
            BitWidthPolicy::Disabled => self.range.min,
            BitWidthPolicy::HalfFloat => f16::from_bits(code as u16).to_f32(),
            BitWidthPolicy::Uncompressed => f32::from_bits(code as u32),
            BitWidthPolicy::FixedBits(_) | BitWidthPolicy::Resolution(_) => {
                let max_code = self.max_code();
                if max_code == 0 {
                    return self.range.min;
                }
                let t = code.min(max_code) as f64 / max_code as f64;
                (f64::from(self.range.min) + t * f64::from(self.range.width())) as f32
            }
        }
    }

    /// Quantizes `value` into a record tied to this quantizer.
    #[must_use]
    pub fn compress(&self, value: f32) -> CompressedScalar<'_> {
        CompressedScalar { quantizer: self, code: self.encode(value) }
    }

    /// Wraps a code received from elsewhere.
    #[must_use]
    pub const fn from_code(&self, code: u64) -> CompressedScalar<'_> {
        CompressedScalar { quantizer: self, code }
    }

    /// Inverse of [`compress`](Self::compress).
    #[must_use]
    pub fn decompress(&self, compressed: CompressedScalar<'_>) -> f32 {
        self.decode(compressed.code)
    }

    /// Keeps only the bits above those sent at `level`.
    #[must_use]
    pub const fn zero_lower_bits(&self, code: u64, level: BitCullingLevel) -> u64 {
        code & !low_mask(self.bit_count(level))
    }

    /// Keeps only the bits sent at `level`.
    #[must_use]
    pub const fn zero_upper_bits(&self, code: u64, level: BitCullingLevel) -> u64 {
        code & low_mask(self.bit_count(level))
    }

    /// Takes the bits sent at `level` from `low` and the rest from `upper`.
    #[must_use]
    pub const fn overwrite_upper_bits(&self, low: u64, upper: u64, level: BitCullingLevel) -> u64 {
        self.zero_lower_bits(upper, level) | self.zero_upper_bits(low, level)
    }

    /// Returns true if `a` and `b` agree on the bits culled at `level`.
    #[must_use]
    pub const fn upper_bits_match(&self, a: u64, b: u64, level: BitCullingLevel) -> bool {
        culling::upper_bits_match(a, b, self.bit_count(level))
    }

    /// Rebuilds a full code from the low bits sent at `level`.
    ///
    /// Candidates share the low bits and sit one step apart, where a step is
    /// `2^bits(level)`. The candidates are the one carrying `previous`'s upper
    /// bits and its neighbours above and below. The candidate closest to
    /// `previous` wins. A tie is always between the unchanged upper bits and
    /// one neighbour, and the unchanged upper bits keep it.
    ///
    /// # Errors
    ///
    /// `Desync` if `previous` is not a valid code, or the winning candidate
    /// is more than half a step from `previous`.
    pub fn guess_upper_bits(
        &self,
        low_bits: u64,
        previous: u64,
        level: BitCullingLevel,
    ) -> CrusherResult<u64> {
        let full = self.bit_count(BitCullingLevel::NoCulling);
        let sent = self.bit_count(level);
        if sent >= full {
            return Ok(low_bits & low_mask(full));
        }
        if sent == 0 {
            return Ok(previous);
        }

        let desync = || {
            warn!(
                "Desync on {:?} at {:?}: previous {} low {}",
                self.axis, level, previous, low_bits
            );
            CrusherError::Desync { axis: self.axis, previous, low_bits, level }
        };

        let max_code = self.max_code();
        if previous > max_code {
            return Err(desync());
        }

        let step = 1u64 << sent;
        let low = low_bits & (step - 1);
        let base = (previous & !(step - 1)) | low;

        let mut best = base;
        let mut best_distance = base.abs_diff(previous);
        let below = base.checked_sub(step);
        let above = base.checked_add(step).filter(|c| *c <= max_code);
        for candidate in [below, above].into_iter().flatten() {
            let distance = candidate.abs_diff(previous);
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }

        if best_distance > step / 2 {
            return Err(desync());
        }
        Ok(best)
    }

    /// Coarsest level no finer than `max_level` whose transmission rebuilds
    /// `current` exactly from `previous`, with the upper bits unchanged.
    #[must_use]
    pub fn find_best_culling_level(
        &self,
        previous: u64,
        current: u64,
        max_level: BitCullingLevel,
    ) -> BitCullingLevel {
        max_level
            .coarsest_first()
            .find(|level| {
                self.upper_bits_match(previous, current, *level)
                    && self.guesses_exactly(previous, current, *level)
            })
            .unwrap_or(BitCullingLevel::NoCulling)
    }

    /// Like [`find_best_culling_level`](Self::find_best_culling_level), but
    /// allows the upper bits to change as long as the guess still lands.
    #[must_use]
    pub fn find_guessable_culling_level(
        &self,
        previous: u64,
        current: u64,
        max_level: BitCullingLevel,
    ) -> BitCullingLevel {
        max_level
            .coarsest_first()
            .find(|level| self.guesses_exactly(previous, current, *level))
            .unwrap_or(BitCullingLevel::NoCulling)
    }

    /// Returns true if the receiver holding `previous` rebuilds `current`
    /// from a transmission at `level`.
    #[must_use]
    pub fn guesses_exactly(&self, previous: u64, current: u64, level: BitCullingLevel) -> bool {
        let low = self.zero_upper_bits(current, level);
        matches!(self.guess_upper_bits(low, previous, level), Ok(guess) if guess == current)
    }

    /// Writes the bits of `code` sent at `level`.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer is full.
    pub fn write(&self, code: u64, level: BitCullingLevel, buffer: &mut BitBuffer) -> CrusherResult<()> {
        let bits = self.bit_count(level);
        buffer.write(code & low_mask(bits), bits)
    }

    /// Reads the bits sent at `level`. Culled upper bits come back as zero.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer runs out.
    pub fn read(&self, buffer: &mut BitBuffer, level: BitCullingLevel) -> CrusherResult<u64> {
        buffer.read(self.bit_count(level))
    }
}

/// A code paired with the quantizer that produced it.
///
/// Equality and hashing look at the code only.
#[derive(Clone, Copy, Debug)]
pub struct CompressedScalar<'q> {
    quantizer: &'q ScalarQuantizer,
    code: u64,
}

impl<'q> CompressedScalar<'q> {
    /// The quantized code.
    #[must_use]
    pub const fn code(&self) -> u64 {
        self.code
    }

    /// Width of the code at full precision.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.quantizer.bit_count(BitCullingLevel::NoCulling)
    }

    /// Producing quantizer.
    #[must_use]
    pub const fn quantizer(&self) -> &'q ScalarQuantizer {
        self.quantizer
    }

    /// Decodes back to a value.
    #[must_use]
    pub fn decompress(&self) -> f32 {
        self.quantizer.decode(self.code)
    }
}

impl PartialEq for CompressedScalar<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for CompressedScalar<'_> {}

impl Hash for CompressedScalar<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_x() -> ScalarQuantizer {
        ScalarQuantizer::fixed(-20.0, 20.0, 12).unwrap()
    }

    #[test]
    fn test_endpoints_and_midpoint() {
        let q = position_x();
        assert_eq!(q.encode(0.0), 2048);
        assert_eq!(q.encode(-20.0), 0);
        assert_eq!(q.encode(20.0), 4095);
        assert!((q.decode(0) + 20.0).abs() < 1e-6);
        assert!((q.decode(4095) - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let q = position_x();
        assert_eq!(q.encode(-1000.0), 0);
        assert_eq!(q.encode(1000.0), 4095);
    }

    #[test]
    fn test_compressed_scalar_roundtrip() {
        let q = position_x();
        let c = q.compress(3.3);
        assert_eq!(c.bits(), 12);
        assert!((c.decompress() - 3.3).abs() <= 40.0 / 4096.0);
        assert_eq!(c, q.from_code(c.code()));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert_eq!(
            ScalarQuantizer::fixed(1.0, -1.0, 8).unwrap_err(),
            CrusherError::InvalidRange { min: 1.0, max: -1.0 }
        );
        assert!(matches!(
            ScalarQuantizer::fixed(0.0, 1.0, 0),
            Err(CrusherError::InvalidBitWidth { bits: 0, .. })
        ));
        assert!(matches!(
            ScalarQuantizer::fixed(0.0, 1.0, 33),
            Err(CrusherError::InvalidBitWidth { bits: 33, .. })
        ));
        assert!(ScalarQuantizer::with_resolution(0.0, 1.0, 0.0).is_err());
        assert!(ScalarQuantizer::with_resolution(0.0, 1.0, f32::NAN).is_err());
        assert!(ScalarQuantizer::with_resolution(0.0, 1.0e9, 1.0e-6).is_err());
        assert!(ScalarQuantizer::fixed(f32::NEG_INFINITY, 0.0, 8).is_err());
    }

    #[test]
    fn test_overflowing_width_rejected() {
        assert_eq!(
            ScalarQuantizer::fixed(-3.0e38, 3.0e38, 12).unwrap_err(),
            CrusherError::InvalidRange { min: -3.0e38, max: 3.0e38 }
        );
        assert!(Range::new(-3.0e38, 3.0e38).is_err());
        assert!(Range::new(-1.0e38, 1.0e38).is_ok());
    }

    #[test]
    fn test_resolution_bits() {
        // 4000 steps need codes 0..=4000
        let q = ScalarQuantizer::with_resolution(-20.0, 20.0, 0.01).unwrap();
        assert_eq!(q.bit_count(BitCullingLevel::NoCulling), 12);

        let q = ScalarQuantizer::with_resolution(0.0, 1.0, 1.0).unwrap();
        assert_eq!(q.bit_count(BitCullingLevel::NoCulling), 1);

        let q = ScalarQuantizer::with_resolution(5.0, 5.0, 0.1).unwrap();
        assert!(!q.is_enabled());
        assert_eq!(q.decode(q.encode(7.0)), 5.0);
    }

    #[test]
    fn test_culling_table() {
        let q = position_x();
        let bits = BitCullingLevel::ALL.map(|l| q.bit_count(l));
        assert_eq!(bits, [12, 8, 6, 0]);

        let half = ScalarQuantizerBuilder::new(0.0, 1.0, BitWidthPolicy::HalfFloat).build().unwrap();
        assert_eq!(BitCullingLevel::ALL.map(|l| half.bit_count(l)), [16, 16, 16, 0]);

        let off = ScalarQuantizerBuilder::disabled().build().unwrap();
        assert_eq!(BitCullingLevel::ALL.map(|l| off.bit_count(l)), [0, 0, 0, 0]);
        assert_eq!(off.encode(3.0), 0);
    }

    #[test]
    fn test_float_policies() {
        let half = ScalarQuantizerBuilder::new(0.0, 1.0, BitWidthPolicy::HalfFloat).build().unwrap();
        assert_eq!(half.decode(half.encode(1.5)), 1.5);
        // Float policies ignore the range
        assert_eq!(half.decode(half.encode(-300.0)), -300.0);

        let raw = ScalarQuantizerBuilder::new(0.0, 1.0, BitWidthPolicy::Uncompressed).build().unwrap();
        assert_eq!(raw.decode(raw.encode(123.456)), 123.456);
    }

    #[test]
    fn test_rotation_axis_wraps() {
        let q = ScalarQuantizerBuilder::new(-180.0, 180.0, BitWidthPolicy::FixedBits(12))
            .kind(TrsKind::Rotation)
            .build()
            .unwrap();
        assert!((q.clamp(270.0) + 90.0).abs() < 1e-4);
        assert!((q.clamp(-190.0) - 170.0).abs() < 1e-4);

        let pitch = ScalarQuantizerBuilder::new(-90.0, 90.0, BitWidthPolicy::FixedBits(12))
            .kind(TrsKind::Rotation)
            .build()
            .unwrap();
        assert!((pitch.clamp(350.0) + 10.0).abs() < 1e-4);
        assert_eq!(pitch.clamp(120.0), 90.0);
    }

    #[test]
    fn test_bit_helpers() {
        let q = position_x();
        let level = BitCullingLevel::DropHalf;
        assert_eq!(q.zero_lower_bits(0xABC, level), 0xA80);
        assert_eq!(q.zero_upper_bits(0xABC, level), 0x03C);
        assert_eq!(q.overwrite_upper_bits(0x001, 0xFFF, level), 0xFC1);
        assert!(q.upper_bits_match(0xA80, 0xABF, level));
        assert!(!q.upper_bits_match(0xA80, 0xB00, level));
    }

    #[test]
    fn test_guess_small_delta() {
        let q = position_x();
        let level = BitCullingLevel::DropHalf;
        let previous = 0x7C0 - 1;
        let current = 0x7C0 + 3;
        let low = q.zero_upper_bits(current, level);
        assert_eq!(q.guess_upper_bits(low, previous, level).unwrap(), current);
        assert_eq!(q.guess_upper_bits(low, previous, BitCullingLevel::DropAll).unwrap(), previous);
        assert_eq!(q.guess_upper_bits(current, previous, BitCullingLevel::NoCulling).unwrap(), current);
    }

    #[test]
    fn test_guess_desync_at_top_edge() {
        let q = position_x();
        let level = BitCullingLevel::DropHalf;
        // 6 low bits: step 64. Previous at the top, low bits far below it.
        let err = q.guess_upper_bits(0, 4095, level).unwrap_err();
        assert!(matches!(err, CrusherError::Desync { axis: Axis::X, previous: 4095, .. }));

        assert!(q.guess_upper_bits(0, 5000, level).is_err());
    }

    #[test]
    fn test_guess_tie_keeps_upper_bits() {
        let q = position_x();
        let level = BitCullingLevel::DropHalf;
        // 6 low bits: step 64. Codes 0 and 64 are both 32 away from 32.
        assert_eq!(q.guess_upper_bits(0, 32, level), Ok(0));
        // Tie with the neighbour below: 2144 and 2080 are both 32 from 2112
        assert_eq!(q.guess_upper_bits(32, 2112, level), Ok(2144));
        // One past the tie goes to the neighbour
        assert_eq!(q.guess_upper_bits(0, 33, level), Ok(64));
    }

    #[test]
    fn test_guess_desync_past_half_step() {
        let q = position_x();
        let level = BitCullingLevel::DropHalf;
        // Only candidates are 50 and 114; both more than 32 from 10
        let err = q.guess_upper_bits(50, 10, level).unwrap_err();
        assert_eq!(
            err,
            CrusherError::Desync { axis: Axis::X, previous: 10, low_bits: 50, level }
        );
        // Exactly half a step still lands
        assert_eq!(q.guess_upper_bits(42, 10, level), Ok(42));
    }

    #[test]
    fn test_find_best_culling_level() {
        let q = position_x();
        let a = 2048;
        assert_eq!(q.find_best_culling_level(a, a, BitCullingLevel::DropAll), BitCullingLevel::DropAll);
        assert_eq!(q.find_best_culling_level(a, a + 3, BitCullingLevel::DropAll), BitCullingLevel::DropHalf);
        assert_eq!(q.find_best_culling_level(a, a + 3, BitCullingLevel::DropThird), BitCullingLevel::DropThird);
        assert_eq!(q.find_best_culling_level(a, a + 100, BitCullingLevel::DropAll), BitCullingLevel::DropThird);
        assert_eq!(q.find_best_culling_level(0, 4095, BitCullingLevel::DropAll), BitCullingLevel::NoCulling);

        // Crossing a 256-code boundary changes the upper bits but stays guessable
        assert_eq!(q.find_best_culling_level(2047, 2049, BitCullingLevel::DropAll), BitCullingLevel::NoCulling);
        assert_eq!(
            q.find_guessable_culling_level(2047, 2049, BitCullingLevel::DropAll),
            BitCullingLevel::DropHalf
        );
    }

    #[test]
    fn test_to_builder_roundtrip() {
        let q = position_x();
        let rebuilt = q.to_builder().range(-10.0, 10.0).build().unwrap();
        assert_eq!(rebuilt.range().max, 10.0);
        assert_eq!(rebuilt.bit_count(BitCullingLevel::NoCulling), 12);
        assert_ne!(rebuilt, q);
        assert_eq!(q.to_builder().build().unwrap(), q);
    }
}

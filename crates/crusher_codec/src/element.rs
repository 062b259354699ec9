//! # Element Quantizer
//!
//! One TRS element: a position, an Euler or quaternion rotation, or a scale.
//!
//! ## Layouts
//!
//! | Kind | Layout | Wire |
//! |------|--------|------|
//! | Position / Euler / Generic | three scalars | enabled axes in x, y, z order |
//! | Scale, uniform axes set | one scalar | single field |
//! | Scale, non-uniform | three scalars | enabled axes in x, y, z order |
//! | Quaternion | rotation quantizer | one packed field |
//!
//! Disabled axes are never written and decode to 0. A disabled element
//! writes nothing at all.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crusher_shared::{Axis, IncludedAxes, Quaternion, UniformAxes, Vec3};

use crate::bitstream::word::low_mask;
use crate::bitstream::BitBuffer;
use crate::error::{CrusherError, CrusherResult};
use crate::quantize::culling;
use crate::quantize::{
    BitCullingLevel, BitWidthPolicy, RotationQuantizer, RotationQuantizerBuilder, ScalarQuantizer,
    ScalarQuantizerBuilder, TrsKind,
};

/// Pitch limit an Euler X axis must stay within to get X correction.
const HALF_RANGE_PITCH: f32 = 90.0;

/// Which part of a transform an element encodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Position in world or local units.
    #[default]
    Position,
    /// Rotation as Euler angles in degrees.
    Euler,
    /// Rotation as a quaternion.
    Quaternion,
    /// Scale factors.
    Scale,
    /// Any other three-component value.
    Generic,
}

impl ElementKind {
    /// Scalar kind used for each axis.
    #[must_use]
    pub const fn scalar_kind(self) -> TrsKind {
        match self {
            Self::Euler | Self::Quaternion => TrsKind::Rotation,
            Self::Scale => TrsKind::Scale,
            Self::Position | Self::Generic => TrsKind::Position,
        }
    }

    /// Returns true for the two rotation kinds.
    #[must_use]
    pub const fn is_rotation(self) -> bool {
        matches!(self, Self::Euler | Self::Quaternion)
    }
}

/// A decoded element, or an input to one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ElementValue {
    /// Position, Euler angles (degrees) or scale.
    Vector(Vec3),
    /// Rotation.
    Quaternion(Quaternion),
}

impl ElementValue {
    const fn name(self) -> &'static str {
        match self {
            Self::Vector(_) => "vector",
            Self::Quaternion(_) => "quaternion",
        }
    }

    /// The vector, if this is one.
    #[must_use]
    pub const fn as_vec3(self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Quaternion(_) => None,
        }
    }

    /// The value as a rotation, reading vectors as Euler degrees.
    #[must_use]
    pub fn to_quaternion(self) -> Quaternion {
        match self {
            Self::Vector(euler) => Quaternion::from_euler_degrees(euler),
            Self::Quaternion(q) => q,
        }
    }
}

/// Mutable setup view of an [`ElementQuantizer`].
///
/// Only the parts the kind uses are compiled: `axes` for three-axis layouts,
/// `uniform` for uniform scale, `rotation` for quaternions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementQuantizerBuilder {
    /// Element kind.
    pub kind: ElementKind,
    /// When false the element writes nothing.
    pub enabled: bool,
    /// Per-axis settings, x, y, z.
    pub axes: [ScalarQuantizerBuilder; 3],
    /// Scale axes collapsed into one value.
    pub uniform_axes: UniformAxes,
    /// Settings for the collapsed scale value.
    pub uniform: ScalarQuantizerBuilder,
    /// Quaternion settings.
    pub rotation: RotationQuantizerBuilder,
    /// Local-space flag for the engine layer. The codec ignores it.
    pub local: bool,
}

impl ElementQuantizerBuilder {
    fn with_kind(kind: ElementKind) -> Self {
        Self {
            kind,
            enabled: true,
            axes: [ScalarQuantizerBuilder::disabled(); 3],
            uniform_axes: UniformAxes::NonUniform,
            uniform: ScalarQuantizerBuilder::disabled(),
            rotation: RotationQuantizerBuilder::default(),
            local: false,
        }
    }

    /// Position defaults: x 12 bits over ±20, y and z 10 bits over ±5.
    #[must_use]
    pub fn position() -> Self {
        let mut builder = Self::with_kind(ElementKind::Position);
        builder.axes = [
            ScalarQuantizerBuilder::new(-20.0, 20.0, BitWidthPolicy::FixedBits(12)),
            ScalarQuantizerBuilder::new(-5.0, 5.0, BitWidthPolicy::FixedBits(10)),
            ScalarQuantizerBuilder::new(-5.0, 5.0, BitWidthPolicy::FixedBits(10)),
        ];
        builder
    }

    /// Euler defaults: pitch 12 bits over ±90, yaw 12 bits over ±180, no roll.
    #[must_use]
    pub fn euler() -> Self {
        let mut builder = Self::with_kind(ElementKind::Euler);
        builder.axes = [
            ScalarQuantizerBuilder::new(-90.0, 90.0, BitWidthPolicy::FixedBits(12)),
            ScalarQuantizerBuilder::new(-180.0, 180.0, BitWidthPolicy::FixedBits(12)),
            ScalarQuantizerBuilder::disabled(),
        ];
        builder
    }

    /// Smallest-three quaternion with the given budget.
    #[must_use]
    pub fn quaternion(bits: u32) -> Self {
        let mut builder = Self::with_kind(ElementKind::Quaternion);
        builder.rotation = RotationQuantizerBuilder::smallest_three(bits);
        builder
    }

    /// Scale defaults: uniform over all axes, 8 bits over `[0, 2]`.
    #[must_use]
    pub fn scale() -> Self {
        let mut builder = Self::with_kind(ElementKind::Scale);
        builder.uniform_axes = UniformAxes::XYZ;
        builder.uniform = ScalarQuantizerBuilder::new(0.0, 2.0, BitWidthPolicy::FixedBits(8));
        builder
    }

    /// Three-axis element with every axis disabled.
    #[must_use]
    pub fn empty(kind: ElementKind) -> Self {
        Self::with_kind(kind)
    }

    /// Replaces one axis' settings. `Axis::Uniform` sets the uniform value.
    #[must_use]
    pub fn axis(mut self, axis: Axis, settings: ScalarQuantizerBuilder) -> Self {
        match axis {
            Axis::X => self.axes[0] = settings,
            Axis::Y => self.axes[1] = settings,
            Axis::Z => self.axes[2] = settings,
            Axis::Uniform => self.uniform = settings,
        }
        self
    }

    /// Sets which scale axes collapse into one value.
    #[must_use]
    pub fn uniform_axes(mut self, uniform_axes: UniformAxes) -> Self {
        self.uniform_axes = uniform_axes;
        self
    }

    /// Turns the whole element on or off.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validates and compiles.
    ///
    /// # Errors
    ///
    /// Any configuration error from the scalar or rotation builders.
    pub fn build(self) -> CrusherResult<ElementQuantizer> {
        let scalar_kind = self.kind.scalar_kind();
        let layout = match self.kind {
            ElementKind::Quaternion => ElementLayout::Rotation(self.rotation.build()?),
            ElementKind::Scale if self.uniform_axes.is_uniform() => ElementLayout::Uniform {
                axes: self.uniform_axes,
                quantizer: self.uniform.axis(Axis::Uniform).kind(scalar_kind).build()?,
            },
            _ => {
                let [x, y, z] = self.axes;
                ElementLayout::ThreeAxis([
                    x.axis(Axis::X).kind(scalar_kind).build()?,
                    y.axis(Axis::Y).kind(scalar_kind).build()?,
                    z.axis(Axis::Z).kind(scalar_kind).build()?,
                ])
            }
        };

        let bits = BitCullingLevel::ALL.map(|level| {
            if self.enabled {
                layout.bit_count(level)
            } else {
                0
            }
        });

        let x_correction = match (&layout, self.kind) {
            (ElementLayout::ThreeAxis([x, _, _]), ElementKind::Euler) => {
                x.is_enabled()
                    && x.range().min >= -HALF_RANGE_PITCH
                    && x.range().max <= HALF_RANGE_PITCH
            }
            _ => false,
        };

        debug!("Element {:?} compiled: bits {:?}, x correction {}", self.kind, bits, x_correction);

        Ok(ElementQuantizer {
            kind: self.kind,
            enabled: self.enabled,
            layout,
            local: self.local,
            x_correction,
            bits,
        })
    }
}

impl Default for ElementQuantizerBuilder {
    fn default() -> Self {
        Self::position()
    }
}

/// Compiled sub-quantizers of an element.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementLayout {
    /// One scalar per axis.
    ThreeAxis([ScalarQuantizer; 3]),
    /// One scalar broadcast to several scale axes.
    Uniform {
        /// Axes the value is written to.
        axes: UniformAxes,
        /// The shared scalar.
        quantizer: ScalarQuantizer,
    },
    /// A packed quaternion.
    Rotation(RotationQuantizer),
}

impl ElementLayout {
    fn bit_count(&self, level: BitCullingLevel) -> u32 {
        match self {
            Self::ThreeAxis(axes) => axes.iter().map(|q| q.bit_count(level)).sum(),
            Self::Uniform { quantizer, .. } => quantizer.bit_count(level),
            Self::Rotation(rotation) => rotation.bit_count(level),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::ThreeAxis(_) => "three_axis",
            Self::Uniform { .. } => "uniform",
            Self::Rotation(_) => "rotation",
        }
    }
}

/// Compiled, immutable element quantizer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementQuantizer {
    kind: ElementKind,
    enabled: bool,
    layout: ElementLayout,
    local: bool,
    x_correction: bool,
    bits: [u32; 4],
}

impl ElementQuantizer {
    /// Position element covering `min..=max` on each axis at `resolution`.
    ///
    /// # Errors
    ///
    /// `InvalidRange` or `InvalidResolution` for any axis.
    pub fn position_from_bounds(min: Vec3, max: Vec3, resolution: f32) -> CrusherResult<Self> {
        let mut builder = ElementQuantizerBuilder::empty(ElementKind::Position);
        for (slot, axis) in builder.axes.iter_mut().zip(Axis::XYZ) {
            *slot = ScalarQuantizerBuilder::new(
                min.get(axis),
                max.get(axis),
                BitWidthPolicy::Resolution(resolution),
            );
        }
        builder.build()
    }

    /// Editable copy of the settings.
    #[must_use]
    pub fn to_builder(&self) -> ElementQuantizerBuilder {
        let mut builder = ElementQuantizerBuilder::empty(self.kind);
        builder.enabled = self.enabled;
        builder.local = self.local;
        match &self.layout {
            ElementLayout::ThreeAxis(axes) => {
                builder.axes = [axes[0].to_builder(), axes[1].to_builder(), axes[2].to_builder()];
            }
            ElementLayout::Uniform { axes, quantizer } => {
                builder.uniform_axes = *axes;
                builder.uniform = quantizer.to_builder();
            }
            ElementLayout::Rotation(rotation) => builder.rotation = rotation.to_builder(),
        }
        builder
    }

    /// Element kind.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Compiled sub-quantizers.
    #[must_use]
    pub const fn layout(&self) -> &ElementLayout {
        &self.layout
    }

    /// Local-space flag, passed through for the engine layer.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.local
    }

    /// Returns true if the element writes anything.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.bits[0] > 0
    }

    /// Scalar for one axis of a three-axis layout, or the uniform scalar.
    #[must_use]
    pub fn axis(&self, axis: Axis) -> Option<&ScalarQuantizer> {
        match (&self.layout, axis) {
            (ElementLayout::ThreeAxis(axes), Axis::X) => Some(&axes[0]),
            (ElementLayout::ThreeAxis(axes), Axis::Y) => Some(&axes[1]),
            (ElementLayout::ThreeAxis(axes), Axis::Z) => Some(&axes[2]),
            (ElementLayout::Uniform { quantizer, .. }, Axis::Uniform) => Some(quantizer),
            _ => None,
        }
    }

    /// Rotation quantizer of a quaternion element.
    #[must_use]
    pub const fn rotation(&self) -> Option<&RotationQuantizer> {
        match &self.layout {
            ElementLayout::Rotation(rotation) => Some(rotation),
            _ => None,
        }
    }

    /// Total bits sent at `level`.
    #[inline]
    #[must_use]
    pub const fn tally_bits(&self, level: BitCullingLevel) -> u32 {
        self.bits[level.index()]
    }

    /// Brings each axis of `value` into its quantizer's domain.
    #[must_use]
    pub fn clamp(&self, value: Vec3) -> Vec3 {
        match &self.layout {
            ElementLayout::ThreeAxis(axes) => axes
                .iter()
                .filter(|q| q.is_enabled())
                .fold(value, |acc, q| acc.with(q.axis(), q.clamp(acc.get(q.axis())))),
            ElementLayout::Uniform { axes, quantizer } => Axis::XYZ
                .into_iter()
                .filter(|axis| axes.mask().includes(*axis))
                .fold(value, |acc, axis| acc.with(axis, quantizer.clamp(acc.get(axis)))),
            ElementLayout::Rotation(_) => value,
        }
    }

    /// Quantizes `value`.
    ///
    /// Euler elements accept quaternions and quaternion elements accept Euler
    /// vectors; both are converted first.
    ///
    /// # Errors
    ///
    /// `ElementMismatch` if a quaternion is given to a non-rotation element.
    pub fn compress(&self, value: ElementValue) -> CrusherResult<CompressedElement<'_>> {
        let value = match (&self.layout, value) {
            (ElementLayout::Rotation(rotation), value) => {
                let code = if self.enabled { rotation.encode(value.to_quaternion()) } else { 0 };
                CompressedValue::Rotation(code)
            }
            (_, ElementValue::Quaternion(q)) if self.kind == ElementKind::Euler => {
                self.compress_vector(q.to_euler_degrees())
            }
            (_, ElementValue::Vector(v)) => self.compress_vector(v),
            (_, found) => {
                return Err(CrusherError::ElementMismatch { expected: "vector", found: found.name() })
            }
        };
        Ok(CompressedElement { quantizer: self, value })
    }

    /// Quantizes a vector.
    ///
    /// # Errors
    ///
    /// Never fails for vectors; the `Result` matches [`compress`](Self::compress).
    pub fn compress_vec3(&self, value: Vec3) -> CrusherResult<CompressedElement<'_>> {
        self.compress(ElementValue::Vector(value))
    }

    /// Quantizes a rotation.
    ///
    /// # Errors
    ///
    /// `ElementMismatch` unless this is a rotation element.
    pub fn compress_quaternion(&self, value: Quaternion) -> CrusherResult<CompressedElement<'_>> {
        self.compress(ElementValue::Quaternion(value))
    }

    fn compress_vector(&self, value: Vec3) -> CompressedValue {
        let value = if self.x_correction { value.x_corrected_euler() } else { value };
        match &self.layout {
            ElementLayout::ThreeAxis(axes) => {
                let mut codes = [0u64; 3];
                if self.enabled {
                    for (code, q) in codes.iter_mut().zip(axes) {
                        *code = q.encode(value.get(q.axis()));
                    }
                }
                CompressedValue::ThreeAxis(codes)
            }
            ElementLayout::Uniform { axes, quantizer } => {
                let code =
                    if self.enabled { quantizer.encode(value.get(axes.source_axis())) } else { 0 };
                CompressedValue::Uniform(code)
            }
            ElementLayout::Rotation(rotation) => {
                CompressedValue::Rotation(rotation.encode(Quaternion::from_euler_degrees(value)))
            }
        }
    }

    /// Wraps codes received from elsewhere.
    ///
    /// # Errors
    ///
    /// `ElementMismatch` if the variant does not fit this element's layout.
    pub fn from_compressed(&self, value: CompressedValue) -> CrusherResult<CompressedElement<'_>> {
        let fits = matches!(
            (&self.layout, value),
            (ElementLayout::ThreeAxis(_), CompressedValue::ThreeAxis(_))
                | (ElementLayout::Uniform { .. }, CompressedValue::Uniform(_))
                | (ElementLayout::Rotation(_), CompressedValue::Rotation(_))
        );
        if !fits {
            return Err(self.mismatch(value));
        }
        Ok(CompressedElement { quantizer: self, value })
    }

    /// Decodes `compressed`.
    ///
    /// Disabled axes come back as 0. A uniform value lands on the uniform
    /// axes only; the others come back as 0. A disabled rotation element
    /// yields identity.
    #[must_use]
    pub fn decompress(&self, compressed: &CompressedElement<'_>) -> ElementValue {
        match (&self.layout, compressed.value) {
            (ElementLayout::Rotation(rotation), CompressedValue::Rotation(code)) => {
                if self.enabled {
                    ElementValue::Quaternion(rotation.decode(code))
                } else {
                    ElementValue::Quaternion(Quaternion::IDENTITY)
                }
            }
            (ElementLayout::Uniform { axes, quantizer }, CompressedValue::Uniform(code))
                if self.enabled =>
            {
                let value = quantizer.decode(code);
                ElementValue::Vector(
                    Axis::XYZ
                        .into_iter()
                        .filter(|axis| axes.mask().includes(*axis))
                        .fold(Vec3::ZERO, |acc, axis| acc.with(axis, value)),
                )
            }
            (ElementLayout::ThreeAxis(axes), CompressedValue::ThreeAxis(codes)) if self.enabled => {
                let mut out = Vec3::ZERO;
                for (q, code) in axes.iter().zip(codes) {
                    if q.is_enabled() {
                        out = out.with(q.axis(), q.decode(code));
                    }
                }
                ElementValue::Vector(out)
            }
            _ => ElementValue::Vector(Vec3::ZERO),
        }
    }

    /// Merges `decoded` into `target`.
    ///
    /// Only enabled axes named in `included` are copied. Uniform values land on
    /// the uniform axes. Rotations replace the target whole.
    #[must_use]
    pub fn apply(&self, target: ElementValue, decoded: ElementValue, included: IncludedAxes) -> ElementValue {
        if !self.enabled {
            return target;
        }
        match (&self.layout, target, decoded) {
            (ElementLayout::ThreeAxis(axes), ElementValue::Vector(t), ElementValue::Vector(d)) => {
                ElementValue::Vector(
                    axes.iter()
                        .filter(|q| q.is_enabled() && included.includes(q.axis()))
                        .fold(t, |acc, q| acc.with(q.axis(), d.get(q.axis()))),
                )
            }
            (ElementLayout::Uniform { axes, .. }, ElementValue::Vector(t), ElementValue::Vector(d)) => {
                ElementValue::Vector(
                    Axis::XYZ
                        .into_iter()
                        .filter(|axis| axes.mask().includes(*axis) && included.includes(*axis))
                        .fold(t, |acc, axis| acc.with(axis, d.get(axis))),
                )
            }
            _ => decoded,
        }
    }

    /// Writes the fields of `compressed` named by `included` at `level`.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer fills, `ElementMismatch` for a foreign record.
    pub fn write(
        &self,
        compressed: &CompressedElement<'_>,
        level: BitCullingLevel,
        included: IncludedAxes,
        buffer: &mut BitBuffer,
    ) -> CrusherResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match (&self.layout, compressed.value) {
            (ElementLayout::ThreeAxis(axes), CompressedValue::ThreeAxis(codes)) => {
                for (q, code) in axes.iter().zip(codes) {
                    if included.includes(q.axis()) {
                        q.write(code, level, buffer)?;
                    }
                }
                Ok(())
            }
            (ElementLayout::Uniform { axes, quantizer }, CompressedValue::Uniform(code)) => {
                if includes_uniform(*axes, included) {
                    quantizer.write(code, level, buffer)?;
                }
                Ok(())
            }
            (ElementLayout::Rotation(rotation), CompressedValue::Rotation(code)) => {
                buffer.write(code, rotation.bit_count(level))
            }
            (_, value) => Err(self.mismatch(value)),
        }
    }

    /// Reads what [`write`](Self::write) wrote.
    ///
    /// At culled levels the record holds only low bits; pass it to
    /// [`reconstruct`](Self::reconstruct) with the previous record.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer runs out.
    pub fn read(
        &self,
        buffer: &mut BitBuffer,
        level: BitCullingLevel,
        included: IncludedAxes,
    ) -> CrusherResult<CompressedElement<'_>> {
        let value = match &self.layout {
            ElementLayout::ThreeAxis(axes) => {
                let mut codes = [0u64; 3];
                if self.enabled {
                    for (code, q) in codes.iter_mut().zip(axes) {
                        if included.includes(q.axis()) {
                            *code = q.read(buffer, level)?;
                        }
                    }
                }
                CompressedValue::ThreeAxis(codes)
            }
            ElementLayout::Uniform { axes, quantizer } => {
                let code = if self.enabled && includes_uniform(*axes, included) {
                    quantizer.read(buffer, level)?
                } else {
                    0
                };
                CompressedValue::Uniform(code)
            }
            ElementLayout::Rotation(rotation) => {
                let code = if self.enabled { buffer.read(rotation.bit_count(level))? } else { 0 };
                CompressedValue::Rotation(code)
            }
        };
        Ok(CompressedElement { quantizer: self, value })
    }

    /// Rebuilds a full record from a culled one and the receiver's previous record.
    ///
    /// Axes outside `included` keep their previous codes.
    ///
    /// # Errors
    ///
    /// `Desync` if any axis cannot be rebuilt, `ElementMismatch` for foreign records.
    pub fn reconstruct(
        &self,
        received: &CompressedElement<'_>,
        previous: &CompressedElement<'_>,
        level: BitCullingLevel,
        included: IncludedAxes,
    ) -> CrusherResult<CompressedElement<'_>> {
        let value = match (&self.layout, received.value, previous.value) {
            (
                ElementLayout::ThreeAxis(axes),
                CompressedValue::ThreeAxis(low),
                CompressedValue::ThreeAxis(prev),
            ) => {
                let mut codes = prev;
                for (i, q) in axes.iter().enumerate() {
                    if included.includes(q.axis()) {
                        codes[i] = q.guess_upper_bits(low[i], prev[i], level)?;
                    }
                }
                CompressedValue::ThreeAxis(codes)
            }
            (
                ElementLayout::Uniform { axes, quantizer },
                CompressedValue::Uniform(low),
                CompressedValue::Uniform(prev),
            ) => {
                if includes_uniform(*axes, included) {
                    CompressedValue::Uniform(quantizer.guess_upper_bits(low, prev, level)?)
                } else {
                    CompressedValue::Uniform(prev)
                }
            }
            (
                ElementLayout::Rotation(rotation),
                CompressedValue::Rotation(code),
                CompressedValue::Rotation(prev),
            ) => {
                if rotation.bit_count(level) == 0 {
                    CompressedValue::Rotation(prev)
                } else {
                    CompressedValue::Rotation(code)
                }
            }
            _ => return Err(self.mismatch(received.value)),
        };
        Ok(CompressedElement { quantizer: self, value })
    }

    /// Coarsest level no finer than `max_level` at which the receiver holding
    /// `previous` rebuilds `current` exactly with unchanged upper bits.
    ///
    /// Quaternions cannot be split, so they reach past `NoCulling` only when
    /// both records are identical.
    #[must_use]
    pub fn find_best_culling_level(
        &self,
        previous: &CompressedElement<'_>,
        current: &CompressedElement<'_>,
        max_level: BitCullingLevel,
    ) -> BitCullingLevel {
        self.coarsest_level(previous, current, max_level, ScalarQuantizer::find_best_culling_level)
    }

    /// Like [`find_best_culling_level`](Self::find_best_culling_level), but
    /// upper bits may change as long as every axis' guess still lands.
    #[must_use]
    pub fn find_guessable_culling_level(
        &self,
        previous: &CompressedElement<'_>,
        current: &CompressedElement<'_>,
        max_level: BitCullingLevel,
    ) -> BitCullingLevel {
        self.coarsest_level(
            previous,
            current,
            max_level,
            ScalarQuantizer::find_guessable_culling_level,
        )
    }

    fn coarsest_level(
        &self,
        previous: &CompressedElement<'_>,
        current: &CompressedElement<'_>,
        max_level: BitCullingLevel,
        per_axis: fn(&ScalarQuantizer, u64, u64, BitCullingLevel) -> BitCullingLevel,
    ) -> BitCullingLevel {
        match (&self.layout, previous.value, current.value) {
            (
                ElementLayout::ThreeAxis(axes),
                CompressedValue::ThreeAxis(prev),
                CompressedValue::ThreeAxis(curr),
            ) => axes
                .iter()
                .zip(prev.into_iter().zip(curr))
                .filter(|(q, _)| q.is_enabled())
                .map(|(q, (p, c))| per_axis(q, p, c, max_level))
                .min()
                .unwrap_or(max_level),
            (
                ElementLayout::Uniform { quantizer, .. },
                CompressedValue::Uniform(prev),
                CompressedValue::Uniform(curr),
            ) => per_axis(quantizer, prev, curr, max_level),
            (
                ElementLayout::Rotation(_),
                CompressedValue::Rotation(prev),
                CompressedValue::Rotation(curr),
            ) if prev == curr => max_level,
            _ => BitCullingLevel::NoCulling,
        }
    }

    /// Bits sent per slot at `level`, matching [`CompressedValue::codes`].
    fn slot_bits(&self, level: BitCullingLevel) -> [u32; 3] {
        match &self.layout {
            ElementLayout::ThreeAxis([x, y, z]) => {
                [x.bit_count(level), y.bit_count(level), z.bit_count(level)]
            }
            ElementLayout::Uniform { quantizer, .. } => [quantizer.bit_count(level), 0, 0],
            ElementLayout::Rotation(rotation) => [rotation.bit_count(level), 0, 0],
        }
    }

    fn mismatch(&self, found: CompressedValue) -> CrusherError {
        CrusherError::ElementMismatch { expected: self.layout.name(), found: found.name() }
    }
}

fn includes_uniform(axes: UniformAxes, included: IncludedAxes) -> bool {
    axes.mask().intersects(included)
}

/// Raw codes of a compressed element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompressedValue {
    /// Per-axis codes, x, y, z. Disabled axes hold 0.
    ThreeAxis([u64; 3]),
    /// The collapsed scale code.
    Uniform(u64),
    /// A packed quaternion.
    Rotation(u64),
}

impl CompressedValue {
    const fn name(self) -> &'static str {
        match self {
            Self::ThreeAxis(_) => "three_axis",
            Self::Uniform(_) => "uniform",
            Self::Rotation(_) => "rotation",
        }
    }

    /// Codes as three slots; single-code variants use slot 0.
    #[must_use]
    pub const fn codes(self) -> [u64; 3] {
        match self {
            Self::ThreeAxis(codes) => codes,
            Self::Uniform(code) | Self::Rotation(code) => [code, 0, 0],
        }
    }

    /// Same variant with new codes.
    #[must_use]
    pub const fn with_codes(self, codes: [u64; 3]) -> Self {
        match self {
            Self::ThreeAxis(_) => Self::ThreeAxis(codes),
            Self::Uniform(_) => Self::Uniform(codes[0]),
            Self::Rotation(_) => Self::Rotation(codes[0]),
        }
    }
}

/// Compressed element paired with the quantizer that produced it.
///
/// Equality and hashing look at the codes only.
#[derive(Clone, Copy, Debug)]
pub struct CompressedElement<'q> {
    quantizer: &'q ElementQuantizer,
    value: CompressedValue,
}

impl<'q> CompressedElement<'q> {
    /// Raw codes.
    #[must_use]
    pub const fn value(&self) -> CompressedValue {
        self.value
    }

    /// Producing quantizer.
    #[must_use]
    pub const fn quantizer(&self) -> &'q ElementQuantizer {
        self.quantizer
    }

    /// Decodes the element.
    #[must_use]
    pub fn decompress(&self) -> ElementValue {
        self.quantizer.decompress(self)
    }

    /// Keeps only the bits culled at `level`.
    #[must_use]
    pub fn zero_lower_bits(&self, level: BitCullingLevel) -> Self {
        self.map_slots(level, |bits, code| code & !low_mask(bits))
    }

    /// Keeps only the bits sent at `level`.
    #[must_use]
    pub fn zero_upper_bits(&self, level: BitCullingLevel) -> Self {
        self.map_slots(level, |bits, code| code & low_mask(bits))
    }

    /// Takes the bits sent at `level` from `self`, the rest from `upper`.
    #[must_use]
    pub fn overwrite_upper_bits(&self, upper: &Self, level: BitCullingLevel) -> Self {
        let bits = self.quantizer.slot_bits(level);
        let low = self.value.codes();
        let high = upper.value.codes();
        let mut codes = [0u64; 3];
        for i in 0..3 {
            let mask = low_mask(bits[i]);
            codes[i] = (high[i] & !mask) | (low[i] & mask);
        }
        Self { quantizer: self.quantizer, value: self.value.with_codes(codes) }
    }

    /// Returns true if both records agree on the bits culled at `level`.
    #[must_use]
    pub fn upper_bits_match(&self, other: &Self, level: BitCullingLevel) -> bool {
        self.zero_lower_bits(level) == other.zero_lower_bits(level)
    }

    /// Highest differing bit across all slots; 0 when equal.
    #[must_use]
    pub fn highest_different_bit(&self, other: &Self) -> u32 {
        self.value
            .codes()
            .into_iter()
            .zip(other.value.codes())
            .map(|(a, b)| culling::highest_different_bit(a, b))
            .max()
            .unwrap_or(0)
    }

    /// Projects forward: `self + (self - previous) / divisor`, in code space.
    ///
    /// Results clamp to each axis' code range. Float-policy axes and
    /// quaternions are returned unchanged. A zero divisor counts as one.
    #[must_use]
    pub fn extrapolate(&self, previous: &Self, divisor: u32) -> Self {
        let divisor = i64::from(divisor.max(1));
        let step = |q: &ScalarQuantizer, curr: u64, prev: u64| -> u64 {
            if !q.policy().is_linear() {
                return curr;
            }
            let (c, p) = (curr as i64, prev as i64);
            (c + (c - p) / divisor).clamp(0, q.max_code() as i64) as u64
        };

        let value = match (self.quantizer.layout(), self.value, previous.value) {
            (
                ElementLayout::ThreeAxis(axes),
                CompressedValue::ThreeAxis(curr),
                CompressedValue::ThreeAxis(prev),
            ) => CompressedValue::ThreeAxis([
                step(&axes[0], curr[0], prev[0]),
                step(&axes[1], curr[1], prev[1]),
                step(&axes[2], curr[2], prev[2]),
            ]),
            (
                ElementLayout::Uniform { quantizer, .. },
                CompressedValue::Uniform(curr),
                CompressedValue::Uniform(prev),
            ) => CompressedValue::Uniform(step(quantizer, curr, prev)),
            _ => self.value,
        };
        Self { quantizer: self.quantizer, value }
    }

    fn map_slots(&self, level: BitCullingLevel, f: impl Fn(u32, u64) -> u64) -> Self {
        let bits = self.quantizer.slot_bits(level);
        let codes = self.value.codes();
        let mapped = [f(bits[0], codes[0]), f(bits[1], codes[1]), f(bits[2], codes[2])];
        Self { quantizer: self.quantizer, value: self.value.with_codes(mapped) }
    }
}

impl PartialEq for CompressedElement<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for CompressedElement<'_> {}

impl Hash for CompressedElement<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

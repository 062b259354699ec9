//! # Transform Quantizer
//!
//! Position, rotation and scale elements composed into one record.
//!
//! ## Wire order
//!
//! ```text
//! [position fields][rotation fields][scale fields]
//! ```
//!
//! An element whose tally at the chosen level is zero contributes no bits.
//! There are no headers and no padding; both ends must agree on the
//! quantizer and the culling level out of band.

use std::hash::{Hash, Hasher};

use tracing::debug;

use crusher_shared::{IncludedAxes, Rotation, TransformSnapshot, Vec3};

use crate::bitstream::BitBuffer;
use crate::element::{
    CompressedElement, ElementKind, ElementQuantizer, ElementQuantizerBuilder, ElementValue,
};
use crate::error::{CrusherError, CrusherResult};
use crate::quantize::BitCullingLevel;

/// Mutable setup view of a [`TransformQuantizer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransformQuantizerBuilder {
    /// Position element.
    pub position: ElementQuantizerBuilder,
    /// Rotation element, Euler or quaternion.
    pub rotation: ElementQuantizerBuilder,
    /// Scale element.
    pub scale: ElementQuantizerBuilder,
}

impl TransformQuantizerBuilder {
    /// Validates each element and the kinds they were given.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if an element has the wrong kind for its slot, or any
    /// error from the element builders.
    pub fn build(self) -> CrusherResult<TransformQuantizer> {
        check_kind("position", self.position.kind, |k| {
            matches!(k, ElementKind::Position | ElementKind::Generic)
        })?;
        check_kind("rotation", self.rotation.kind, ElementKind::is_rotation)?;
        check_kind("scale", self.scale.kind, |k| {
            matches!(k, ElementKind::Scale | ElementKind::Generic)
        })?;

        let position = self.position.build()?;
        let rotation = self.rotation.build()?;
        let scale = self.scale.build()?;

        let bits = BitCullingLevel::ALL.map(|level| {
            position.tally_bits(level) + rotation.tally_bits(level) + scale.tally_bits(level)
        });
        debug!("Transform compiled: bits per level {:?}", bits);

        Ok(TransformQuantizer { position, rotation, scale, bits })
    }
}

impl Default for TransformQuantizerBuilder {
    fn default() -> Self {
        Self {
            position: ElementQuantizerBuilder::position(),
            rotation: ElementQuantizerBuilder::euler(),
            scale: ElementQuantizerBuilder::scale(),
        }
    }
}

fn check_kind(slot: &str, kind: ElementKind, allowed: impl Fn(ElementKind) -> bool) -> CrusherResult<()> {
    if allowed(kind) {
        Ok(())
    } else {
        Err(CrusherError::InvalidConfig(format!("{slot} element cannot be {kind:?}")))
    }
}

/// Compiled, immutable transform quantizer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransformQuantizer {
    position: ElementQuantizer,
    rotation: ElementQuantizer,
    scale: ElementQuantizer,
    bits: [u32; 4],
}

impl TransformQuantizer {
    /// Editable copy of the settings.
    #[must_use]
    pub fn to_builder(&self) -> TransformQuantizerBuilder {
        TransformQuantizerBuilder {
            position: self.position.to_builder(),
            rotation: self.rotation.to_builder(),
            scale: self.scale.to_builder(),
        }
    }

    /// Position element.
    #[must_use]
    pub const fn position(&self) -> &ElementQuantizer {
        &self.position
    }

    /// Rotation element.
    #[must_use]
    pub const fn rotation(&self) -> &ElementQuantizer {
        &self.rotation
    }

    /// Scale element.
    #[must_use]
    pub const fn scale(&self) -> &ElementQuantizer {
        &self.scale
    }

    /// Total bits of a record at `level`.
    #[inline]
    #[must_use]
    pub const fn tally_bits(&self, level: BitCullingLevel) -> u32 {
        self.bits[level.index()]
    }

    /// Empty buffer sized for one full record.
    #[must_use]
    pub fn new_buffer(&self) -> BitBuffer {
        BitBuffer::with_capacity(self.tally_bits(BitCullingLevel::NoCulling) as usize)
    }

    /// Quantizes a snapshot.
    ///
    /// # Errors
    ///
    /// `ElementMismatch` only for misconfigured elements.
    pub fn compress(&self, snapshot: &TransformSnapshot) -> CrusherResult<CompressedTransform<'_>> {
        let rotation = match snapshot.rotation {
            Rotation::Quaternion(q) => ElementValue::Quaternion(q),
            Rotation::Euler(euler) => ElementValue::Vector(euler),
        };
        Ok(CompressedTransform {
            quantizer: self,
            position: self.position.compress_vec3(snapshot.position)?,
            rotation: self.rotation.compress(rotation)?,
            scale: self.scale.compress_vec3(snapshot.scale)?,
        })
    }

    /// Decodes a record. Disabled parts come back as zero.
    #[must_use]
    pub fn decompress(&self, compressed: &CompressedTransform<'_>) -> TransformSnapshot {
        let position = vector_or_zero(compressed.position.decompress());
        let rotation = match compressed.rotation.decompress() {
            ElementValue::Quaternion(q) => Rotation::Quaternion(q),
            ElementValue::Vector(euler) => Rotation::Euler(euler),
        };
        let scale = vector_or_zero(compressed.scale.decompress());
        TransformSnapshot::new(position, rotation, scale)
    }

    /// Merges a decoded snapshot into `target`, leaving disabled parts alone.
    #[must_use]
    pub fn apply(&self, target: &TransformSnapshot, decoded: &TransformSnapshot) -> TransformSnapshot {
        let position = vector_or(
            self.position.apply(
                ElementValue::Vector(target.position),
                ElementValue::Vector(decoded.position),
                IncludedAxes::XYZ,
            ),
            target.position,
        );

        let rotation = match self.rotation.kind() {
            ElementKind::Euler => Rotation::Euler(vector_or(
                self.rotation.apply(
                    ElementValue::Vector(target.rotation.to_euler()),
                    ElementValue::Vector(decoded.rotation.to_euler()),
                    IncludedAxes::XYZ,
                ),
                target.rotation.to_euler(),
            )),
            _ if self.rotation.is_enabled() => decoded.rotation,
            _ => target.rotation,
        };

        let scale = vector_or(
            self.scale.apply(
                ElementValue::Vector(target.scale),
                ElementValue::Vector(decoded.scale),
                IncludedAxes::XYZ,
            ),
            target.scale,
        );

        TransformSnapshot::new(position, rotation, scale)
    }

    /// Writes a full record.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer fills.
    pub fn write(&self, compressed: &CompressedTransform<'_>, buffer: &mut BitBuffer) -> CrusherResult<()> {
        self.write_culled(compressed, BitCullingLevel::NoCulling, buffer)
    }

    /// Writes the low bits of every field at `level`.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer fills.
    pub fn write_culled(
        &self,
        compressed: &CompressedTransform<'_>,
        level: BitCullingLevel,
        buffer: &mut BitBuffer,
    ) -> CrusherResult<()> {
        for (element, value) in self.elements().into_iter().zip(compressed.elements()) {
            if element.tally_bits(level) > 0 {
                element.write(value, level, IncludedAxes::XYZ, buffer)?;
            }
        }
        Ok(())
    }

    /// Reads a full record.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer runs out.
    pub fn read(&self, buffer: &mut BitBuffer) -> CrusherResult<CompressedTransform<'_>> {
        self.read_culled(buffer, BitCullingLevel::NoCulling)
    }

    /// Reads a record written at `level`. Culled bits come back as zero.
    ///
    /// # Errors
    ///
    /// `Capacity` if the buffer runs out.
    pub fn read_culled(
        &self,
        buffer: &mut BitBuffer,
        level: BitCullingLevel,
    ) -> CrusherResult<CompressedTransform<'_>> {
        // Elements with nothing to send at this level read zero bits
        let position = self.position.read(buffer, level, IncludedAxes::XYZ)?;
        let rotation = self.rotation.read(buffer, level, IncludedAxes::XYZ)?;
        let scale = self.scale.read(buffer, level, IncludedAxes::XYZ)?;
        Ok(CompressedTransform { quantizer: self, position, rotation, scale })
    }

    /// Rebuilds a full record from one read at `level` and the previous record.
    ///
    /// # Errors
    ///
    /// `Desync` if any field cannot be rebuilt. Callers should then ask for a
    /// `NoCulling` resend.
    pub fn reconstruct(
        &self,
        received: &CompressedTransform<'_>,
        previous: &CompressedTransform<'_>,
        level: BitCullingLevel,
    ) -> CrusherResult<CompressedTransform<'_>> {
        Ok(CompressedTransform {
            quantizer: self,
            position: self.position.reconstruct(
                &received.position,
                &previous.position,
                level,
                IncludedAxes::XYZ,
            )?,
            rotation: self.rotation.reconstruct(
                &received.rotation,
                &previous.rotation,
                level,
                IncludedAxes::XYZ,
            )?,
            scale: self.scale.reconstruct(&received.scale, &previous.scale, level, IncludedAxes::XYZ)?,
        })
    }

    /// Coarsest level no finer than `max_level` that every element supports.
    #[must_use]
    pub fn find_best_culling_level(
        &self,
        previous: &CompressedTransform<'_>,
        current: &CompressedTransform<'_>,
        max_level: BitCullingLevel,
    ) -> BitCullingLevel {
        self.elements()
            .into_iter()
            .zip(previous.elements().into_iter().zip(current.elements()))
            .map(|(element, (prev, curr))| element.find_best_culling_level(prev, curr, max_level))
            .min()
            .unwrap_or(max_level)
    }

    const fn elements(&self) -> [&ElementQuantizer; 3] {
        [&self.position, &self.rotation, &self.scale]
    }
}

fn vector_or_zero(value: ElementValue) -> Vec3 {
    value.as_vec3().unwrap_or(Vec3::ZERO)
}

fn vector_or(value: ElementValue, fallback: Vec3) -> Vec3 {
    value.as_vec3().unwrap_or(fallback)
}

/// A compressed transform record.
///
/// Two records are equal when all three elements carry the same codes,
/// whichever quantizer instances produced them.
#[derive(Clone, Copy, Debug)]
pub struct CompressedTransform<'q> {
    quantizer: &'q TransformQuantizer,
    position: CompressedElement<'q>,
    rotation: CompressedElement<'q>,
    scale: CompressedElement<'q>,
}

impl<'q> CompressedTransform<'q> {
    /// Producing quantizer.
    #[must_use]
    pub const fn quantizer(&self) -> &'q TransformQuantizer {
        self.quantizer
    }

    /// Position element.
    #[must_use]
    pub const fn position(&self) -> &CompressedElement<'q> {
        &self.position
    }

    /// Rotation element.
    #[must_use]
    pub const fn rotation(&self) -> &CompressedElement<'q> {
        &self.rotation
    }

    /// Scale element.
    #[must_use]
    pub const fn scale(&self) -> &CompressedElement<'q> {
        &self.scale
    }

    /// Decodes the record.
    #[must_use]
    pub fn decompress(&self) -> TransformSnapshot {
        self.quantizer.decompress(self)
    }

    const fn elements(&self) -> [&CompressedElement<'q>; 3] {
        [&self.position, &self.rotation, &self.scale]
    }
}

impl PartialEq for CompressedTransform<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.rotation == other.rotation && self.scale == other.scale
    }
}

impl Eq for CompressedTransform<'_> {}

impl Hash for CompressedTransform<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.hash(state);
        self.rotation.hash(state);
        self.scale.hash(state);
    }
}

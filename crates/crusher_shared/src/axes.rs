//! Axis tags and axis masks.
//!
//! Masks use bit 0 for X, bit 1 for Y and bit 2 for Z, matching the values
//! the engine layer already stores in its inspector settings.

use serde::{Deserialize, Serialize};

/// A single axis of an element. `Uniform` is the collapsed scale axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
    /// One value standing in for several scale axes.
    Uniform,
}

impl Axis {
    /// The three spatial axes in wire order.
    pub const XYZ: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Mask flag for this axis. `Uniform` has none.
    #[must_use]
    pub const fn flag(self) -> IncludedAxes {
        match self {
            Self::X => IncludedAxes::X,
            Self::Y => IncludedAxes::Y,
            Self::Z => IncludedAxes::Z,
            Self::Uniform => IncludedAxes::empty(),
        }
    }
}

bitflags::bitflags! {
    /// Which axes a partial update carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IncludedAxes: u8 {
        /// X only.
        const X = 0b001;
        /// Y only.
        const Y = 0b010;
        /// Z only.
        const Z = 0b100;
        /// X and Y.
        const XY = Self::X.bits() | Self::Y.bits();
        /// X and Z.
        const XZ = Self::X.bits() | Self::Z.bits();
        /// Y and Z.
        const YZ = Self::Y.bits() | Self::Z.bits();
        /// All three axes.
        const XYZ = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
    }
}

impl IncludedAxes {
    /// Returns true if `axis` is part of the mask.
    #[must_use]
    pub const fn includes(self, axis: Axis) -> bool {
        self.intersects(axis.flag())
    }
}

impl Default for IncludedAxes {
    fn default() -> Self {
        Self::XYZ
    }
}

// Stored as the raw mask byte; bits above Z are dropped on load
impl Serialize for IncludedAxes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IncludedAxes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

/// Which scale axes share a single uniform value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniformAxes {
    /// Every axis is quantized separately.
    #[default]
    #[serde(rename = "non_uniform")]
    NonUniform,
    /// X and Y share a value.
    XY,
    /// X and Z share a value.
    XZ,
    /// Y and Z share a value.
    YZ,
    /// All three axes share a value.
    XYZ,
}

impl UniformAxes {
    /// Axis mask covered by the uniform value.
    #[must_use]
    pub const fn mask(self) -> IncludedAxes {
        match self {
            Self::NonUniform => IncludedAxes::empty(),
            Self::XY => IncludedAxes::XY,
            Self::XZ => IncludedAxes::XZ,
            Self::YZ => IncludedAxes::YZ,
            Self::XYZ => IncludedAxes::XYZ,
        }
    }

    /// Returns true if any axes are collapsed.
    #[must_use]
    pub const fn is_uniform(self) -> bool {
        !matches!(self, Self::NonUniform)
    }

    /// Axis whose input value is sampled when compressing.
    ///
    /// Y for `YZ`, X for everything else.
    #[must_use]
    pub const fn source_axis(self) -> Axis {
        match self {
            Self::YZ => Axis::Y,
            _ => Axis::X,
        }
    }
}

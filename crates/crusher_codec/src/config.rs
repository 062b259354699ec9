//! Declarative quantizer configuration, stored as TOML.
//!
//! ```toml
//! [position]
//! kind = "position"
//!
//! [position.x]
//! policy = "fixed_bits"
//! bits = 12
//! min = -20.0
//! max = 20.0
//!
//! [rotation]
//! kind = "quaternion"
//! bits = 32
//!
//! [scale]
//! kind = "scale"
//! uniform_axes = "xyz"
//!
//! [scale.uniform]
//! policy = "resolution"
//! resolution = 0.01
//! min = 0.0
//! max = 2.0
//! ```
//!
//! A missing axis table means the axis is disabled. Sections left out of a
//! transform file fall back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crusher_shared::UniformAxes;

use crate::element::{ElementKind, ElementQuantizerBuilder};
use crate::error::{CrusherError, CrusherResult};
use crate::quantize::{
    BitWidthPolicy, RotationEncoding, RotationQuantizerBuilder, ScalarQuantizerBuilder,
};
use crate::transform::{TransformQuantizer, TransformQuantizerBuilder};

/// Width policy name as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Needs `bits`.
    FixedBits,
    /// Needs `resolution`.
    Resolution,
    /// 16-bit half float.
    HalfFloat,
    /// 32-bit float.
    Uncompressed,
    /// Axis is not sent.
    Disabled,
}

/// One axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarConfig {
    /// Width policy.
    pub policy: PolicyKind,
    /// Bit count for `fixed_bits`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<u32>,
    /// Step for `resolution`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f32>,
    /// Lower bound (default: 0.0)
    #[serde(default)]
    pub min: f32,
    /// Upper bound (default: 0.0)
    #[serde(default)]
    pub max: f32,
}

impl ScalarConfig {
    /// Converts into a builder.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the policy's parameter is missing.
    pub fn to_builder(&self) -> CrusherResult<ScalarQuantizerBuilder> {
        let policy = match self.policy {
            PolicyKind::FixedBits => BitWidthPolicy::FixedBits(self.bits.ok_or_else(|| {
                CrusherError::InvalidConfig("fixed_bits policy needs `bits`".to_string())
            })?),
            PolicyKind::Resolution => BitWidthPolicy::Resolution(self.resolution.ok_or_else(|| {
                CrusherError::InvalidConfig("resolution policy needs `resolution`".to_string())
            })?),
            PolicyKind::HalfFloat => BitWidthPolicy::HalfFloat,
            PolicyKind::Uncompressed => BitWidthPolicy::Uncompressed,
            PolicyKind::Disabled => BitWidthPolicy::Disabled,
        };
        Ok(ScalarQuantizerBuilder::new(self.min, self.max, policy))
    }
}

impl From<&ScalarQuantizerBuilder> for ScalarConfig {
    fn from(builder: &ScalarQuantizerBuilder) -> Self {
        let (policy, bits, resolution) = match builder.policy {
            BitWidthPolicy::FixedBits(bits) => (PolicyKind::FixedBits, Some(bits), None),
            BitWidthPolicy::Resolution(step) => (PolicyKind::Resolution, None, Some(step)),
            BitWidthPolicy::HalfFloat => (PolicyKind::HalfFloat, None, None),
            BitWidthPolicy::Uncompressed => (PolicyKind::Uncompressed, None, None),
            BitWidthPolicy::Disabled => (PolicyKind::Disabled, None, None),
        };
        Self { policy, bits, resolution, min: builder.range.min, max: builder.range.max }
    }
}

/// One element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementConfig {
    /// Element kind.
    pub kind: ElementKind,
    /// Whether the element is sent at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local-space flag for the engine layer (default: false)
    #[serde(default)]
    pub local: bool,
    /// Collapsed scale axes (default: non_uniform)
    #[serde(default)]
    pub uniform_axes: UniformAxes,
    /// Quaternion packing (default: smallest_three)
    #[serde(default)]
    pub encoding: RotationEncoding,
    /// Quaternion budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<u32>,
    /// X axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<ScalarConfig>,
    /// Y axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<ScalarConfig>,
    /// Z axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<ScalarConfig>,
    /// Collapsed scale value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform: Option<ScalarConfig>,
}

fn default_true() -> bool {
    true
}

impl ElementConfig {
    /// Converts into a builder.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when a quaternion has no budget, a uniform scale has
    /// no `uniform` table, or an axis table is incomplete.
    pub fn to_builder(&self) -> CrusherResult<ElementQuantizerBuilder> {
        let mut builder = ElementQuantizerBuilder::empty(self.kind);
        builder.enabled = self.enabled;
        builder.local = self.local;
        builder.uniform_axes = self.uniform_axes;

        for (slot, axis) in builder.axes.iter_mut().zip([&self.x, &self.y, &self.z]) {
            if let Some(axis) = axis {
                *slot = axis.to_builder()?;
            }
        }

        if self.uniform.is_some() && self.kind != ElementKind::Scale {
            return Err(CrusherError::InvalidConfig(format!(
                "`uniform` is only valid on scale elements, found {:?}",
                self.kind
            )));
        }

        if let Some(uniform) = &self.uniform {
            builder.uniform = uniform.to_builder()?;
        } else if self.kind == ElementKind::Scale && self.uniform_axes.is_uniform() {
            return Err(CrusherError::InvalidConfig(
                "uniform scale needs a `uniform` table".to_string(),
            ));
        }

        if self.kind == ElementKind::Quaternion {
            builder.rotation = match (self.encoding, self.bits) {
                (RotationEncoding::HalfFloat, _) => RotationQuantizerBuilder::half_float(),
                (RotationEncoding::SmallestThree, Some(bits)) => {
                    RotationQuantizerBuilder::smallest_three(bits)
                }
                (RotationEncoding::SmallestThree, None) => {
                    return Err(CrusherError::InvalidConfig(
                        "quaternion element needs `bits`".to_string(),
                    ))
                }
            };
        }

        Ok(builder)
    }
}

impl From<&ElementQuantizerBuilder> for ElementConfig {
    fn from(builder: &ElementQuantizerBuilder) -> Self {
        let axis = |b: &ScalarQuantizerBuilder| {
            (!matches!(b.policy, BitWidthPolicy::Disabled)).then(|| ScalarConfig::from(b))
        };
        let quaternion = builder.kind == ElementKind::Quaternion;
        let uniform = builder.kind == ElementKind::Scale && builder.uniform_axes.is_uniform();
        Self {
            kind: builder.kind,
            enabled: builder.enabled,
            local: builder.local,
            uniform_axes: builder.uniform_axes,
            encoding: builder.rotation.encoding,
            bits: quaternion.then_some(builder.rotation.bits),
            x: if uniform || quaternion { None } else { axis(&builder.axes[0]) },
            y: if uniform || quaternion { None } else { axis(&builder.axes[1]) },
            z: if uniform || quaternion { None } else { axis(&builder.axes[2]) },
            uniform: if uniform { Some(ScalarConfig::from(&builder.uniform)) } else { None },
        }
    }
}

/// A whole transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    /// Position element (default: x 12 bits ±20, y/z 10 bits ±5)
    #[serde(default = "default_position")]
    pub position: ElementConfig,
    /// Rotation element (default: Euler, pitch ±90 and yaw ±180 at 12 bits)
    #[serde(default = "default_rotation")]
    pub rotation: ElementConfig,
    /// Scale element (default: uniform, 8 bits over 0..2)
    #[serde(default = "default_scale")]
    pub scale: ElementConfig,
}

fn default_position() -> ElementConfig {
    ElementConfig::from(&ElementQuantizerBuilder::position())
}

fn default_rotation() -> ElementConfig {
    ElementConfig::from(&ElementQuantizerBuilder::euler())
}

fn default_scale() -> ElementConfig {
    ElementConfig::from(&ElementQuantizerBuilder::scale())
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self { position: default_position(), rotation: default_rotation(), scale: default_scale() }
    }
}

impl TransformConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on syntax errors or unknown fields.
    pub fn from_toml_str(text: &str) -> CrusherResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> CrusherResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            CrusherError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Renders as TOML.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> CrusherResult<String> {
        toml::to_string(self).map_err(|err| CrusherError::InvalidConfig(err.to_string()))
    }

    /// Converts into a builder.
    ///
    /// # Errors
    ///
    /// See [`ElementConfig::to_builder`].
    pub fn to_builder(&self) -> CrusherResult<TransformQuantizerBuilder> {
        Ok(TransformQuantizerBuilder {
            position: self.position.to_builder()?,
            rotation: self.rotation.to_builder()?,
            scale: self.scale.to_builder()?,
        })
    }

    /// Converts and compiles.
    ///
    /// # Errors
    ///
    /// Any configuration error.
    pub fn build(&self) -> CrusherResult<TransformQuantizer> {
        self.to_builder()?.build()
    }
}

impl From<&TransformQuantizerBuilder> for TransformConfig {
    fn from(builder: &TransformQuantizerBuilder) -> Self {
        Self {
            position: ElementConfig::from(&builder.position),
            rotation: ElementConfig::from(&builder.rotation),
            scale: ElementConfig::from(&builder.scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::BitCullingLevel;

    #[test]
    fn test_default_matches_builders() {
        let from_config = TransformConfig::default().build().unwrap();
        let from_builder = TransformQuantizerBuilder::default().build().unwrap();
        assert_eq!(from_config, from_builder);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TransformConfig::from_toml_str("").unwrap();
        assert_eq!(config, TransformConfig::default());
    }

    #[test]
    fn test_parse_quaternion_transform() {
        let text = r#"
            [position]
            kind = "position"

            [position.x]
            policy = "resolution"
            resolution = 0.01
            min = -10.0
            max = 10.0

            [rotation]
            kind = "quaternion"
            bits = 29

            [scale]
            kind = "scale"
            enabled = false
        "#;
        let q = TransformConfig::from_toml_str(text).unwrap().build().unwrap();
        // 11 bits of x, 29 of rotation, nothing else
        assert_eq!(q.tally_bits(BitCullingLevel::NoCulling), 40);
    }

    #[test]
    fn test_missing_parameters_rejected() {
        let text = r#"
            [rotation]
            kind = "quaternion"
        "#;
        let err = TransformConfig::from_toml_str(text).unwrap().build().unwrap_err();
        assert!(matches!(err, CrusherError::InvalidConfig(_)));

        let text = r#"
            [position]
            kind = "position"
            [position.x]
            policy = "fixed_bits"
        "#;
        assert!(TransformConfig::from_toml_str(text).unwrap().build().is_err());
    }

    #[test]
    fn test_uniform_only_on_scale() {
        let text = r#"
            [position]
            kind = "position"
            [position.uniform]
            policy = "fixed_bits"
            bits = 8
            min = 0.0
            max = 1.0
        "#;
        assert!(TransformConfig::from_toml_str(text).unwrap().to_builder().is_err());

        let text = r#"
            [scale]
            kind = "scale"
            uniform_axes = "xy"
        "#;
        assert!(TransformConfig::from_toml_str(text).unwrap().to_builder().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = TransformConfig::from_toml_str("[position]\nkind = \"position\"\nspeed = 3\n");
        assert!(matches!(err, Err(CrusherError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = TransformConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(TransformConfig::from_toml_str(&text).unwrap(), config);
    }
}

//! Transform snapshots - one sample of position, rotation and scale.
//!
//! The engine layer reads its scene objects into a [`TransformSnapshot`],
//! hands it to the codec, and writes decoded snapshots back. The codec never
//! touches the scene objects themselves.

use serde::{Deserialize, Serialize};

use crate::math::{Quaternion, Vec3};

/// A rotation as the engine layer supplied it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Unit quaternion.
    Quaternion(Quaternion),
    /// Euler angles in degrees.
    Euler(Vec3),
}

impl Rotation {
    /// The rotation as a quaternion.
    #[must_use]
    pub fn to_quaternion(self) -> Quaternion {
        match self {
            Self::Quaternion(q) => q,
            Self::Euler(e) => Quaternion::from_euler_degrees(e),
        }
    }

    /// The rotation as Euler angles in degrees.
    ///
    /// Quaternions are decomposed into `[0, 360)` per axis.
    #[must_use]
    pub fn to_euler(self) -> Vec3 {
        match self {
            Self::Quaternion(q) => q.to_euler_degrees(),
            Self::Euler(e) => e,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::Quaternion(Quaternion::IDENTITY)
    }
}

/// Transform - position + rotation + scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Rotation,
    /// Scale (per axis)
    pub scale: Vec3,
}

impl TransformSnapshot {
    /// Creates a new snapshot
    #[must_use]
    pub const fn new(position: Vec3, rotation: Rotation, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Identity transform
    pub const IDENTITY: Self = Self::new(
        Vec3::ZERO,
        Rotation::Quaternion(Quaternion::IDENTITY),
        Vec3::ONE,
    );
}

impl Default for TransformSnapshot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_conversions_agree() {
        let euler = Vec3::new(30.0, 45.0, 60.0);
        let q = Rotation::Euler(euler).to_quaternion();
        let back = Rotation::Quaternion(q).to_euler();
        let q2 = Quaternion::from_euler_degrees(back);
        assert!(q.angle_between(q2) < 1e-3);
    }

    #[test]
    fn test_identity_snapshot() {
        let t = TransformSnapshot::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.rotation.to_quaternion(), Quaternion::IDENTITY);
    }
}

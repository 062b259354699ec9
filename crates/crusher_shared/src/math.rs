//! Mathematical types shared between the codec and the engine layer.
//!
//! These are the canonical representations the codec consumes and produces.
//! Euler angles are in degrees and follow the Z-X-Y application order
//! (roll, then pitch, then yaw) used by the engine the codec was built for.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::axes::Axis;

/// Below this length a quaternion is treated as degenerate.
const DEGENERATE_LENGTH_SQ: f32 = 1.0e-12;

/// 3D Vector - position, Euler angles, scale
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All components one
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Creates a vector with every component set to `value`
    #[must_use]
    pub const fn splat(value: f32) -> Self {
        Self::new(value, value, value)
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Returns the component for `axis`. `Axis::Uniform` reads X.
    #[must_use]
    pub const fn get(self, axis: Axis) -> f32 {
        match axis {
            Axis::X | Axis::Uniform => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Returns a copy with the component for `axis` replaced.
    #[must_use]
    pub fn with(mut self, axis: Axis, value: f32) -> Self {
        match axis {
            Axis::X | Axis::Uniform => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
        self
    }

    /// Largest absolute per-component difference.
    #[must_use]
    pub fn max_abs_diff(self, other: Self) -> f32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// Rewrites Euler angles so pitch lands in [-90, 90].
    ///
    /// `(x, y, z)` and `(180 - x, y + 180, z + 180)` describe the same
    /// orientation. Pitch quantizers restricted to half a circle rely on this
    /// to never see an out-of-range X.
    #[must_use]
    pub fn x_corrected_euler(self) -> Self {
        let x = wrap_degrees(self.x, -180.0);
        if (-90.0..=90.0).contains(&x) {
            return Self::new(x, self.y, self.z);
        }
        Self::new(
            wrap_degrees(180.0 - x, -180.0),
            wrap_degrees(self.y + 180.0, -180.0),
            wrap_degrees(self.z + 180.0, -180.0),
        )
    }
}

/// Wraps an angle in degrees into `[start, start + 360)`.
#[must_use]
pub fn wrap_degrees(angle: f32, start: f32) -> f32 {
    let wrapped = (angle - start).rem_euclid(360.0) + start;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= start + 360.0 {
        start
    } else {
        wrapped
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Converts to `[x, y, z, w]`
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Creates from `[x, y, z, w]`
    #[must_use]
    pub const fn from_array(arr: [f32; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// 4D dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Length squared
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Returns true if the length is within `tolerance` of one.
    #[must_use]
    pub fn is_normalized(self, tolerance: f32) -> bool {
        (self.length_squared().sqrt() - 1.0).abs() <= tolerance
    }

    /// Unit-length copy. Degenerate input collapses to identity.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq <= DEGENERATE_LENGTH_SQ || !len_sq.is_finite() {
            return Self::IDENTITY;
        }
        let inv = len_sq.sqrt().recip();
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Angle in radians of the rotation taking `self` onto `other`.
    ///
    /// `q` and `-q` are the same rotation, so the result is in `[0, PI]`.
    #[must_use]
    pub fn angle_between(self, other: Self) -> f32 {
        let d = self.normalize().dot(other.normalize()).abs().min(1.0);
        2.0 * d.acos()
    }

    /// Builds a rotation from Euler angles in degrees (Z, then X, then Y).
    #[must_use]
    pub fn from_euler_degrees(euler: Vec3) -> Self {
        let (sx, cx) = (euler.x.to_radians() * 0.5).sin_cos();
        let (sy, cy) = (euler.y.to_radians() * 0.5).sin_cos();
        let (sz, cz) = (euler.z.to_radians() * 0.5).sin_cos();

        Self::new(
            cz * cy * sx + cx * sy * sz,
            cz * cx * sy - cy * sx * sz,
            cy * cx * sz - cz * sy * sx,
            cx * cy * cz + sx * sy * sz,
        )
    }

    /// Decomposes into Euler angles in degrees, each in `[0, 360)`.
    #[must_use]
    pub fn to_euler_degrees(self) -> Vec3 {
        let q = self.normalize();
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);

        // -m12 of the rotation matrix
        let sin_pitch = (2.0 * (w * x - y * z)).clamp(-1.0, 1.0);

        let (pitch, yaw, roll) = if sin_pitch.abs() > 0.999_999 {
            // Gimbal lock: fold roll into yaw
            let m00 = 1.0 - 2.0 * (y * y + z * z);
            let m20 = 2.0 * (x * z - w * y);
            (sin_pitch.asin(), (-m20).atan2(m00), 0.0)
        } else {
            let yaw = (2.0 * (x * z + w * y)).atan2(1.0 - 2.0 * (x * x + y * y));
            let roll = (2.0 * (x * y + w * z)).atan2(1.0 - 2.0 * (x * x + z * z));
            (sin_pitch.asin(), yaw, roll)
        };

        Vec3::new(
            wrap_degrees(pitch.to_degrees(), 0.0),
            wrap_degrees(yaw.to_degrees(), 0.0),
            wrap_degrees(roll.to_degrees(), 0.0),
        )
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Neg for Quaternion {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_axis_access() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(a.get(Axis::Y), 2.0);
        assert_eq!(a.get(Axis::Uniform), 1.0);
        assert_eq!(a.with(Axis::Y, 9.0).get(Axis::Y), 9.0);
        assert_eq!(a.with(Axis::Z, 9.0), Vec3::new(1.0, 2.0, 9.0));
        assert_eq!(a.max_abs_diff(Vec3::new(1.5, 0.0, 3.0)), 2.0);
    }

    #[test]
    fn test_vec3_bytemuck() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 12); // 3 * 4 bytes
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(370.0, 0.0), 10.0);
        assert_eq!(wrap_degrees(-90.0, 0.0), 270.0);
        assert_eq!(wrap_degrees(180.0, -180.0), -180.0);
        assert_eq!(wrap_degrees(-1.0e-8, 0.0), 0.0);
    }

    #[test]
    fn test_single_axis_euler() {
        let q = Quaternion::from_euler_degrees(Vec3::new(0.0, 90.0, 0.0));
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((q.y - half).abs() < 1e-6);
        assert!((q.w - half).abs() < 1e-6);
        assert!(q.x.abs() < 1e-6 && q.z.abs() < 1e-6);
    }

    #[test]
    fn test_euler_roundtrip() {
        for &(x, y, z) in &[
            (10.0, 20.0, 30.0),
            (45.0, 300.0, 5.0),
            (350.0, 90.0, 180.0),
            (80.0, 10.0, 270.0),
        ] {
            let q = Quaternion::from_euler_degrees(Vec3::new(x, y, z));
            let back = Quaternion::from_euler_degrees(q.to_euler_degrees());
            assert!(q.angle_between(back) < 1e-3, "({x}, {y}, {z})");
        }
    }

    #[test]
    fn test_x_corrected_euler_same_rotation() {
        let original = Vec3::new(120.0, 30.0, -40.0);
        let corrected = original.x_corrected_euler();
        assert!((-90.0..=90.0).contains(&corrected.x));

        let a = Quaternion::from_euler_degrees(original);
        let b = Quaternion::from_euler_degrees(corrected);
        assert!(a.angle_between(b) < 1e-3);
    }

    #[test]
    fn test_normalize_degenerate() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize(), Quaternion::IDENTITY);
        assert!(Quaternion::new(1.0, 2.0, 3.0, 4.0).normalize().is_normalized(1e-6));
    }
}

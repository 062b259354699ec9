//! # CRUSHER Shared
//!
//! Plain numeric types used by the transform codec and by any engine layer
//! that feeds it.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on an engine, a renderer or a network
//! transport. The codec only ever sees the values defined here:
//!
//! - [`Vec3`] for positions, Euler angles (degrees) and scales
//! - [`Quaternion`] for rotations
//! - [`TransformSnapshot`] for one full position/rotation/scale sample
//! - [`IncludedAxes`] / [`UniformAxes`] masks for partial updates

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod axes;
pub mod math;
pub mod snapshot;

pub use axes::{Axis, IncludedAxes, UniformAxes};
pub use math::{Quaternion, Vec3};
pub use snapshot::{Rotation, TransformSnapshot};

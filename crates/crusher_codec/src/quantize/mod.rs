//! # Quantizers
//!
//! Leaf quantizers for a single scalar and for a quaternion, plus the culling
//! levels they share.

pub mod culling;
pub mod rotation;
pub mod scalar;

pub use culling::{highest_different_bit, BitCullingLevel};
pub use rotation::{
    CompressedRotation, RotationEncoding, RotationQuantizer, RotationQuantizerBuilder,
};
pub use scalar::{
    BitWidthPolicy, CompressedScalar, Range, ScalarQuantizer, ScalarQuantizerBuilder, TrsKind,
};

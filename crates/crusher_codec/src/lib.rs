//! # CRUSHER Codec
//!
//! Bit-level compression of transforms (position, rotation, scale) for
//! networked state sync.
//!
//! ## Architecture
//!
//! ```text
//! TransformQuantizer
//! ├── ElementQuantizer (position)  ── ScalarQuantizer x3
//! ├── ElementQuantizer (rotation)  ── ScalarQuantizer x3 (Euler)
//! │                                   or RotationQuantizer (quaternion)
//! └── ElementQuantizer (scale)     ── ScalarQuantizer x3 or one uniform
//!                 │
//!                 ▼
//!            BitBuffer  (u64 words, MSB-first, big-endian bytes)
//! ```
//!
//! ## Design Principles
//!
//! 1. **Compiled quantizers are immutable** - builders are the only mutable
//!    view; `build()` validates and caches per-level bit widths
//! 2. **Records borrow their quantizer** - `CompressedTransform<'q>` and
//!    friends are short-lived, per-message values
//! 3. **No shared scratch** - buffers are caller-owned
//! 4. **Culling drops upper bits** - the receiver guesses them back from its
//!    previous value and reports `Desync` when it cannot
//!
//! ## Example
//!
//! ```rust,ignore
//! use crusher_codec::{BitCullingLevel, TransformConfig};
//!
//! let quantizer = TransformConfig::from_toml_file("data/crusher/player.toml")?.build()?;
//! let mut buffer = quantizer.new_buffer();
//!
//! let compressed = quantizer.compress(&snapshot)?;
//! let level = quantizer.find_best_culling_level(&last_sent, &compressed, BitCullingLevel::DropAll);
//! quantizer.write_culled(&compressed, level, &mut buffer)?;
//!
//! // Receiver
//! let received = quantizer.read_culled(&mut buffer, level)?;
//! let restored = quantizer.reconstruct(&received, &last_received, level)?;
//! let snapshot = restored.decompress();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bitstream;
pub mod config;
pub mod element;
pub mod error;
pub mod quantize;
pub mod registry;
pub mod transform;

pub use bitstream::BitBuffer;
pub use config::{ElementConfig, PolicyKind, ScalarConfig, TransformConfig};
pub use element::{
    CompressedElement, CompressedValue, ElementKind, ElementLayout, ElementQuantizer,
    ElementQuantizerBuilder, ElementValue,
};
pub use error::{CrusherError, CrusherResult};
pub use quantize::{
    highest_different_bit, BitCullingLevel, BitWidthPolicy, CompressedRotation, CompressedScalar,
    Range, RotationEncoding, RotationQuantizer, RotationQuantizerBuilder, ScalarQuantizer,
    ScalarQuantizerBuilder, TrsKind,
};
pub use registry::QuantizerRegistry;
pub use transform::{CompressedTransform, TransformQuantizer, TransformQuantizerBuilder};

pub use crusher_shared::{
    Axis, IncludedAxes, Quaternion, Rotation, TransformSnapshot, UniformAxes, Vec3,
};

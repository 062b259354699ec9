//! # Codec Error Types
//!
//! All errors that can occur while configuring or running the codec.
//!
//! Configuration errors abort setup. Capacity and desync errors are per-call
//! conditions the network layer answers, usually by asking for a resend at
//! [`BitCullingLevel::NoCulling`](crate::BitCullingLevel::NoCulling).

use thiserror::Error;

use crusher_shared::Axis;

use crate::quantize::BitCullingLevel;

/// Errors that can occur in the codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrusherError {
    /// Range with `min > max` or a non-finite bound.
    #[error("invalid range: min {min} must be finite and <= max {max}")]
    InvalidRange {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },

    /// Fixed bit width outside `1..=max`.
    #[error("invalid bit width {bits}: must be in 1..={max}")]
    InvalidBitWidth {
        /// Requested width.
        bits: u32,
        /// Largest allowed width.
        max: u32,
    },

    /// Resolution step that is not positive, or needs too many bits.
    #[error("invalid resolution step {0}")]
    InvalidResolution(f32),

    /// Rotation bit budget outside the supported window.
    #[error("invalid rotation bit budget {bits}: must be in {min}..={max}")]
    InvalidRotationBits {
        /// Requested budget.
        bits: u32,
        /// Smallest budget (one bit per component plus selector).
        min: u32,
        /// Largest budget.
        max: u32,
    },

    /// Structural problem in a declarative configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A value of the wrong shape was handed to an element.
    #[error("element mismatch: expected {expected}, found {found}")]
    ElementMismatch {
        /// What the element is configured for.
        expected: &'static str,
        /// What it was given.
        found: &'static str,
    },

    /// Read or write past the end of a buffer.
    #[error("bit capacity exceeded: need {requested} bits, capacity {capacity}")]
    Capacity {
        /// Bit position the operation would reach.
        requested: usize,
        /// Buffer capacity in bits.
        capacity: usize,
    },

    /// The receiver could not rebuild culled upper bits.
    #[error("desync on {axis:?} at {level:?}: previous code {previous}, low bits {low_bits}")]
    Desync {
        /// Axis that failed.
        axis: Axis,
        /// Code the receiver last knew.
        previous: u64,
        /// Low bits that arrived.
        low_bits: u64,
        /// Culling level of the transmission.
        level: BitCullingLevel,
    },
}

impl CrusherError {
    /// Returns true for per-call conditions a caller can recover from.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Capacity { .. } | Self::Desync { .. })
    }
}

impl From<toml::de::Error> for CrusherError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Result type for codec operations.
pub type CrusherResult<T> = Result<T, CrusherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classes() {
        assert!(CrusherError::Capacity { requested: 65, capacity: 64 }.is_recoverable());
        assert!(CrusherError::Desync {
            axis: Axis::X,
            previous: 1,
            low_bits: 2,
            level: BitCullingLevel::DropHalf,
        }
        .is_recoverable());
        assert!(!CrusherError::InvalidRange { min: 1.0, max: 0.0 }.is_recoverable());
        assert!(!CrusherError::InvalidRotationBits { bits: 2, min: 5, max: 64 }.is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = CrusherError::InvalidBitWidth { bits: 40, max: 32 };
        assert_eq!(err.to_string(), "invalid bit width 40: must be in 1..=32");
    }
}

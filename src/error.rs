//! Error type shared by every component of the crate.
//!
//! Configuration problems surface from the `new` constructors, input contract
//! violations from the per-call methods. Nothing here is retryable: the engines
//! perform no I/O, so an error always means the caller handed over bad data.

use thiserror::Error;

/// Errors raised by the matrices, the connections store and the two engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HtmError {
    /// A configuration value is outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Empty, zero-sized or mismatched dimension lists.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A dense vector handed to a compute call has the wrong length.
    #[error("input length mismatch: expected {expected}, got {actual}")]
    InputLength {
        /// Required length.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// Two matrices combined element-wise do not share a shape.
    #[error("matrix shape mismatch: {expected:?} vs {actual:?}")]
    DimensionMismatch {
        /// `(width, height)` of the receiver.
        expected: (usize, usize),
        /// `(width, height)` of the argument.
        actual: (usize, usize),
    },

    /// A permanence outside `[0, 1]` was supplied.
    #[error("permanence {0} outside [0, 1]")]
    PermanenceOutOfRange(f32),

    /// An identifier does not name an existing cell, column, segment or synapse.
    #[error("{kind} index {index} out of range (size {size})")]
    IndexOutOfRange {
        /// Kind of identifier (`"cell"`, `"segment"`, ...).
        kind: &'static str,
        /// The rejected identifier.
        index: usize,
        /// Number of valid identifiers.
        size: usize,
    },

    /// Active columns passed to the temporal memory are not strictly increasing.
    #[error("active columns must be sorted and free of duplicates")]
    UnsortedColumns,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HtmError>;

impl HtmError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        HtmError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn out_of_range(kind: &'static str, index: usize, size: usize) -> Self {
        HtmError::IndexOutOfRange { kind, index, size }
    }
}

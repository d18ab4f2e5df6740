//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum QbridgeError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The experience store holds no transitions to sample from.
    #[error("Insufficient data in the experience store")]
    InsufficientData,

    /// A state vector did not match the fixed dimensionality of the learner.
    #[error("State dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimensionality fixed at learner initialization.
        expected: usize,
        /// Dimensionality of the offending vector.
        got: usize,
    },
}

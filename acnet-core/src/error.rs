//! Errors in the library.
use thiserror::Error;

/// Errors raised when building networks or feeding them inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input has the wrong number of dimensions.
    #[error("Rank mismatch for {input}: expected {expected} dimensions, got {actual}")]
    RankMismatch {
        /// Name of the input.
        input: &'static str,
        /// Expected rank.
        expected: usize,
        /// Actual rank.
        actual: usize,
    },

    /// An input has the wrong size along one axis.
    #[error("Dimension mismatch for {input} on axis {axis}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Name of the input.
        input: &'static str,
        /// Axis on which the sizes differ.
        axis: usize,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// Two inputs disagree on the batch size.
    #[error("Batch size mismatch: state has {state} rows, action has {action} rows")]
    BatchSizeMismatch {
        /// Batch size of the state input.
        state: usize,
        /// Batch size of the action input.
        action: usize,
    },

    /// An input has an unexpected element type.
    #[error("Data type mismatch for {input}: expected {expected}, got {actual}")]
    DTypeMismatch {
        /// Name of the input.
        input: &'static str,
        /// Expected element type.
        expected: String,
        /// Actual element type.
        actual: String,
    },

    /// Batch statistics cannot be computed from the given batch in training mode.
    #[error("Batch normalization of {input} needs at least 2 samples in training mode, got {batch_size}")]
    DegenerateBatch {
        /// Name of the input.
        input: &'static str,
        /// Batch size of the input.
        batch_size: usize,
    },
}

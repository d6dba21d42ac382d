//! Error types for featurizer pipelines

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for featurizer pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// The protocol step a computation failure was reported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputationStep {
    /// Querying the training state
    TrainingState,
    /// Submitting a row during training
    Fit,
    /// Signalling the end of a pass
    OnDataCompleted,
    /// Completing training
    CompleteTraining,
    /// Creating the finalized computation
    CreateTransformer,
    /// Transforming a row with the finalized computation
    Transform,
}

impl fmt::Display for ComputationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComputationStep::TrainingState => "training state query",
            ComputationStep::Fit => "fit",
            ComputationStep::OnDataCompleted => "data completion",
            ComputationStep::CompleteTraining => "complete training",
            ComputationStep::CreateTransformer => "transformer creation",
            ComputationStep::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// Error type for featurizer pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or missing configuration parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A bound column does not exist in the schema
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Data type mismatch
    #[error("Data type mismatch: {0}")]
    TypeMismatch(String),

    /// Vector shape mismatch
    #[error("Shape mismatch for '{column}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Column whose shape is wrong
        column: String,
        /// Expected dimensions
        expected: Vec<usize>,
        /// Actual dimensions
        actual: Vec<usize>,
    },

    /// The stateful computation reported a failure
    #[error("Computation failed during {step}: {message}")]
    Computation {
        /// Step that failed
        step: ComputationStep,
        /// Message reported by the computation
        message: String,
    },

    /// A released computation handle was used
    #[error("Computation handle already released: {0}")]
    Disposed(&'static str),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A persisted state blob is malformed or from an unsupported version
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Wrap an error raised inside a computation, tagging the failing step.
    ///
    /// Errors that already carry a step keep their original tag.
    pub fn computation(step: ComputationStep, err: Error) -> Self {
        match err {
            err @ Error::Computation { .. } => err,
            other => Error::Computation {
                step,
                message: other.to_string(),
            },
        }
    }

    /// The failing step, if this is a computation failure
    pub fn step(&self) -> Option<ComputationStep> {
        match self {
            Error::Computation { step, .. } => Some(*step),
            _ => None,
        }
    }
}

//! Error types for the sweep harness

use thiserror::Error;

/// Crate-wide error type.
///
/// The variants map onto the harness failure policy: `ValidationError` is
/// fatal to the whole experiment, `TrainingDataError` skips one sweep cell,
/// `ArtifactError` and `PredictionError` skip one model kind within a cell.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Invalid experiment configuration (sample size exceeds dataset,
    /// held-out set too small). Aborts the whole sweep.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Malformed or unreadable input data.
    #[error("Data error: {0}")]
    DataError(String),

    /// A requested column is missing from the input table.
    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    /// The training stage rejected the training table or fold plan.
    #[error("Training data rejected: {0}")]
    TrainingDataError(String),

    /// A persisted model artifact is missing or cannot be deserialized.
    #[error("Artifact error: {0}")]
    ArtifactError(String),

    /// A loaded model failed at prediction time.
    #[error("Prediction error: {0}")]
    PredictionError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SweepError>;

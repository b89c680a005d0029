//! Fitted model artifacts: classifiers, scalers and label encoders
//!
//! Classifiers and scalers are exported from training as ONNX graphs and run
//! through tract; label encoders are plain class lists. Nothing here fits
//! or mutates a model after it has been loaded and validated.

pub mod classifier;
pub mod encoder;
pub mod graph;
pub mod scaler;

pub use classifier::{ClassLabel, Classifier, OnnxClassifier};
pub use encoder::LabelEncoder;
pub use graph::OnnxGraph;
pub use scaler::{OnnxScaler, Scaler};

use thiserror::Error;

/// Errors raised while validating or evaluating an artifact
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtifactError {
    /// Feature vector length differs from what the artifact was fitted on
    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Parameters are structurally inconsistent
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Graph could not be parsed, typed or optimized
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Encoded value has no label in the encoder
    #[error("code {0} is outside the encoder classes")]
    CodeOutOfRange(i64),

    /// Evaluation produced no usable output
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Shared shape check used by every evaluator
pub(crate) fn check_dimension(expected: usize, features: &[f64]) -> Result<(), ArtifactError> {
    if features.len() != expected {
        return Err(ArtifactError::DimensionMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

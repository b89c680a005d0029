//! Error types for hai-md
//!
//! Loading, preprocessing and classifier errors stay internal. Only the
//! three [`DispatchError`] kinds reach a caller, and [`ApiError`] maps them
//! to HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hai_common::api::types::ErrorResponse;
use std::path::PathBuf;
use thiserror::Error;

use crate::model_id::ModelId;

pub use crate::artifacts::ArtifactError;
pub use crate::preprocess::PreprocessError;

// Caller-facing messages
pub const MISSING_FIELDS_MESSAGE: &str = "Missing model_name or input_data";
pub const INVALID_MODEL_MESSAGE: &str = "Invalid model_name provided.";
pub const INFERENCE_FAILURE_MESSAGE: &str = "Internal server error during ML diagnosis";

// ============================================================================
// Startup
// ============================================================================

/// Why a model bundle could not be turned into a [`ModelEntry`](crate::registry::ModelEntry)
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("bundle not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bundle: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported bundle format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("invalid bundle manifest: {0}")]
    InvalidManifest(String),

    #[error("bundle declares model '{found}' but was loaded for '{expected}'")]
    ModelMismatch { expected: ModelId, found: ModelId },

    #[error("missing required component: {0}")]
    MissingComponent(String),

    #[error("invalid {component}: {source}")]
    InvalidComponent {
        component: String,
        #[source]
        source: ArtifactError,
    },

    #[error("{component} expects {actual} features but the schema has {expected}")]
    DimensionMismatch {
        component: &'static str,
        expected: usize,
        actual: usize,
    },
}

// ============================================================================
// Dispatch
// ============================================================================

/// Pipeline stage a dispatch failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Preprocess,
    Inference,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Preprocess => "preprocess",
            DispatchStage::Inference => "inference",
        }
    }
}

/// Failure of one dispatch call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{} model not loaded.", .0.display_name())]
    ServiceUnavailable(ModelId),

    #[error("{model_id} {} failed: {detail}", .stage.as_str())]
    InferenceFailure {
        model_id: ModelId,
        stage: DispatchStage,
        detail: String,
    },
}

impl DispatchError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::ServiceUnavailable(_) => "service_unavailable",
            DispatchError::InferenceFailure { .. } => "inference_failure",
        }
    }

    /// Message safe to show a caller; inference details never leave the process
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::InvalidRequest(msg) => msg.clone(),
            DispatchError::ServiceUnavailable(id) => {
                format!("{} model not loaded.", id.display_name())
            }
            DispatchError::InferenceFailure { .. } => INFERENCE_FAILURE_MESSAGE.to_string(),
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Request body could not be read as JSON
    #[error("Malformed request body: {0}")]
    BadRequest(String),

    /// Worker task panicked or was cancelled
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Dispatch(DispatchError::InvalidRequest(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Dispatch(DispatchError::ServiceUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Dispatch(DispatchError::InferenceFailure { .. }) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Dispatch(err) => ErrorResponse {
                error: err.public_message(),
                kind: err.kind().to_string(),
            },
            ApiError::BadRequest(msg) => ErrorResponse {
                error: msg,
                kind: "invalid_request".to_string(),
            },
            ApiError::Internal(_) => ErrorResponse {
                error: INFERENCE_FAILURE_MESSAGE.to_string(),
                kind: "inference_failure".to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

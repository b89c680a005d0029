//! Model availability listing

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::model_id::ModelId;
use crate::registry::{Availability, ModelStatus};
use crate::AppState;

/// One registry slot as reported to operators
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_id: ModelId,
    /// "loaded" or "unavailable"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<ModelStatus> for ModelInfo {
    fn from(status: ModelStatus) -> Self {
        let (label, reason) = match status.availability {
            Availability::Loaded => ("loaded", None),
            Availability::Unavailable { reason } => ("unavailable", Some(reason)),
        };
        Self {
            model_id: status.model_id,
            status: label,
            version: status.version,
            fingerprint: status.fingerprint,
            reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// GET /api/ml-models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state
        .dispatcher
        .registry()
        .statuses()
        .into_iter()
        .map(ModelInfo::from)
        .collect();
    Json(ModelsResponse { models })
}

pub fn model_routes() -> Router<AppState> {
    Router::new().route("/api/ml-models", get(list_models))
}

//! Diagnosis endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use hai_common::api::types::{DispatchRequest, PredictionResult};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /api/ml-diagnosis
///
/// Classification is CPU-bound, so the dispatch runs on the blocking pool.
pub async fn ml_diagnosis(
    State(state): State<AppState>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> ApiResult<Json<PredictionResult>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let dispatcher = state.dispatcher.clone();
    let result = tokio::task::spawn_blocking(move || dispatcher.dispatch_request(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))??;

    Ok(Json(result))
}

pub fn diagnosis_routes() -> Router<AppState> {
    Router::new().route("/api/ml-diagnosis", post(ml_diagnosis))
}

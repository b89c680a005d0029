//! HTTP surface tests for hai-md

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use hai_md::artifacts::{OnnxClassifier, OnnxScaler};
use hai_md::{build_router, AppState, ModelEntry, ModelId, ModelRegistry};

fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

/// Router with only the kidney stone model loaded
fn setup_app() -> Router {
    // Positive when calc exceeds 2
    let classifier =
        OnnxClassifier::from_bytes(&fixture("kidney_classifier.onnx"), vec![0, 1]).unwrap();
    let scaler = OnnxScaler::from_bytes(&fixture("identity_scaler_6.onnx")).unwrap();
    let entry = ModelEntry::builder(ModelId::KidneyStoneDetection, classifier)
        .scaler(scaler)
        .version("test")
        .build()
        .unwrap();

    let registry = ModelRegistry::from_entries([entry]);
    build_router(AppState::new(Arc::new(registry)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_diagnosis_success() {
    let app = setup_app();
    let body = json!({
        "model_id": "kidney_stone_detection",
        "input_data": {"gravity": 1.02, "ph": 6.1, "osmo": 650, "cond": 25, "urea": 280, "calc": 3.5}
    });

    let response = app
        .oneshot(post_json("/api/ml-diagnosis", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["condition"], "Kidney Stones Detected");
    assert_eq!(json["category"], "Urology");
    assert_eq!(json["urgency"], "High");
    // sigmoid(3.5 - 2) as a percentage
    assert_eq!(json["confidence"].as_f64().unwrap(), 81.76);
    assert!(json["recommendations"].is_array());
    assert!(json["next_steps"].is_array());
}

#[tokio::test]
async fn test_diagnosis_accepts_model_name() {
    let app = setup_app();
    let body = json!({"model_name": "kidney_stone_detection", "input_data": {"calc": 0.5}});

    let response = app
        .oneshot(post_json("/api/ml-diagnosis", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["condition"], "No Kidney Stones Detected");
    assert_eq!(json["urgency"], "Low");
}

#[tokio::test]
async fn test_diagnosis_unknown_model_is_400() {
    let app = setup_app();
    let body = json!({"model_id": "liver_disease", "input_data": {"x": 1}});

    let response = app
        .oneshot(post_json("/api/ml-diagnosis", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid model_name provided.");
    assert_eq!(json["kind"], "invalid_request");
}

#[tokio::test]
async fn test_diagnosis_missing_input_is_400() {
    let app = setup_app();

    let response = app
        .oneshot(post_json(
            "/api/ml-diagnosis",
            json!({"model_id": "kidney_stone_detection"}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing model_name or input_data");
}

#[tokio::test]
async fn test_diagnosis_malformed_json_is_400() {
    let app = setup_app();

    let response = app
        .oneshot(post_json("/api/ml-diagnosis", "{\"model_id\": ".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "invalid_request");
}

#[tokio::test]
async fn test_diagnosis_non_finite_feature_is_500() {
    let app = setup_app();
    let body = json!({"model_id": "kidney_stone_detection", "input_data": {"ph": "nan", "calc": 3.5}});

    let response = app
        .oneshot(post_json("/api/ml-diagnosis", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Internal server error during ML diagnosis");
    assert_eq!(json["kind"], "inference_failure");
}

#[tokio::test]
async fn test_diagnosis_unavailable_model_is_503() {
    let app = setup_app();
    let body = json!({"model_id": "heart_disease", "input_data": {"age": 50}});

    let response = app
        .oneshot(post_json("/api/ml-diagnosis", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Heart disease model not loaded.");
    assert_eq!(json["kind"], "service_unavailable");
}

#[tokio::test]
async fn test_list_models() {
    let app = setup_app();

    let response = app
        .oneshot(Request::builder().uri("/api/ml-models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let models = json["models"].as_array().unwrap();
    assert_eq!(models.len(), 5);

    let kidney = models
        .iter()
        .find(|m| m["model_id"] == "kidney_stone_detection")
        .unwrap();
    assert_eq!(kidney["status"], "loaded");
    assert_eq!(kidney["version"], "test");

    let heart = models.iter().find(|m| m["model_id"] == "heart_disease").unwrap();
    assert_eq!(heart["status"], "unavailable");
    assert!(heart["reason"].is_string());
}

#[tokio::test]
async fn test_health_reports_degraded() {
    let app = setup_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["module"], "hai-md");
    assert_eq!(json["models_loaded"], 1);
    assert_eq!(json["models_total"], 5);
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_build_info() {
    let app = setup_app();

    let response = app
        .oneshot(Request::builder().uri("/api/buildinfo").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["git_hash"].is_string());
}

//! Diagnosis dispatcher
//!
//! One call runs validate → preprocess → infer → compose, stopping at the
//! first failure. No stage is retried and no partial result is returned.
//! The dispatcher holds only the shared registry and is safe to call from
//! any number of worker threads at once.

use hai_common::api::types::{DispatchRequest, PredictionResult};
use serde_json::{Map, Value};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

use crate::error::{DispatchError, DispatchStage, INVALID_MODEL_MESSAGE, MISSING_FIELDS_MESSAGE};
use crate::inference;
use crate::model_id::ModelId;
use crate::recommend;
use crate::registry::ModelRegistry;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn dispatch_request(&self, request: &DispatchRequest) -> Result<PredictionResult, DispatchError> {
        self.dispatch(request.model_id.as_deref(), request.input_data.as_ref())
    }

    /// Run one diagnosis
    pub fn dispatch(
        &self,
        model_id: Option<&str>,
        input: Option<&Value>,
    ) -> Result<PredictionResult, DispatchError> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "dispatch",
            model_id = model_id.unwrap_or("-"),
            request_id = %request_id
        );
        let _enter = span.enter();

        let (model_id, input) = validate(model_id, input)?;
        self.run(model_id, input)
    }

    fn run(&self, model_id: ModelId, input: &Map<String, Value>) -> Result<PredictionResult, DispatchError> {
        let entry = self.registry.get(model_id).map_err(|e| {
            warn!(reason = %e.reason, "Dispatch to unavailable model");
            DispatchError::ServiceUnavailable(model_id)
        })?;

        let schema = entry.schema_for(input);
        let vector = entry
            .preprocessor()
            .build_vector(&schema, input)
            .map_err(|e| failure(model_id, DispatchStage::Preprocess, e, input))?;
        debug!(features = vector.len(), "Preprocessed");

        let outcome = inference::infer(entry, &vector)
            .map_err(|e| failure(model_id, DispatchStage::Inference, e, input))?;
        debug!(class = %outcome.class, confidence = outcome.confidence, "Inferred");

        Ok(recommend::compose(model_id, &outcome.class, outcome.confidence))
    }
}

/// Boundary parsing: known model id and a non-empty input object
pub fn validate<'a>(
    model_id: Option<&str>,
    input: Option<&'a Value>,
) -> Result<(ModelId, &'a Map<String, Value>), DispatchError> {
    let model_id = model_id.filter(|id| !id.is_empty());
    let input = input.and_then(Value::as_object).filter(|map| !map.is_empty());

    let (Some(model_id), Some(input)) = (model_id, input) else {
        return Err(DispatchError::InvalidRequest(MISSING_FIELDS_MESSAGE.to_string()));
    };
    let model_id = model_id
        .parse::<ModelId>()
        .map_err(|_| DispatchError::InvalidRequest(INVALID_MODEL_MESSAGE.to_string()))?;
    Ok((model_id, input))
}

/// Log with field names only and wrap as an inference failure
fn failure(
    model_id: ModelId,
    stage: DispatchStage,
    err: impl Display,
    input: &Map<String, Value>,
) -> DispatchError {
    let fields: Vec<&str> = input.keys().map(String::as_str).collect();
    error!(
        stage = stage.as_str(),
        fields = ?fields,
        error = %err,
        "Diagnosis failed"
    );
    DispatchError::InferenceFailure {
        model_id,
        stage,
        detail: err.to_string(),
    }
}

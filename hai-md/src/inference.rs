//! Inference engine: classifier output to (predicted class, confidence)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

use crate::artifacts::ArtifactError;
use crate::model_id::PredictionMode;
use crate::preprocess::FeatureVector;
use crate::registry::ModelEntry;

/// Positive-class probability must exceed this for a binary-risk positive
pub const RISK_THRESHOLD: f64 = 0.5;

/// Predicted class in the form the composer consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictedClass {
    /// Numeric class label
    Code(i64),
    /// Label recovered through the model's class encoder
    Label(String),
}

impl fmt::Display for PredictedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictedClass::Code(code) => write!(f, "{}", code),
            PredictedClass::Label(label) => f.write_str(label),
        }
    }
}

/// Outcome of one classifier invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub class: PredictedClass,
    /// Percentage, rounded to two decimals
    pub confidence: f64,
}

/// Run the entry's classifier over `vector`
pub fn infer(entry: &ModelEntry, vector: &FeatureVector) -> Result<Inference, ArtifactError> {
    let classifier = entry.classifier();
    let features = vector.as_slice();

    let (code, probability) = match entry.model_id().prediction_mode() {
        PredictionMode::BinaryRisk => {
            let proba = classifier.predict_proba(features)?;
            let positive = positive_probability(&proba)?;
            let code = if positive > RISK_THRESHOLD { 1 } else { 0 };
            (code, positive)
        }
        PredictionMode::Labeled => {
            let code = classifier.predict(features)?;
            let proba = classifier.predict_proba(features)?;
            let top = proba.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !top.is_finite() {
                return Err(ArtifactError::Evaluation("no finite class probability".to_string()));
            }
            (code, top)
        }
    };

    let class = match entry.class_encoder() {
        Some(encoder) => PredictedClass::Label(encoder.inverse_transform(code)?.to_string()),
        None => PredictedClass::Code(code),
    };

    Ok(Inference {
        class,
        confidence: round2(probability * 100.0),
    })
}

/// Probability of the second class of a two-class output
fn positive_probability(proba: &[f64]) -> Result<f64, ArtifactError> {
    match proba {
        [_, positive] if positive.is_finite() => Ok(*positive),
        _ => Err(ArtifactError::Evaluation(format!(
            "expected two finite class probabilities, got {:?}",
            proba
        ))),
    }
}

/// Round to two decimals, ties to even, on the exact binary value
///
/// `3.125` is exactly representable and rounds to `3.12`; `2.675` is
/// stored just below the tie and rounds to `2.67`.
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

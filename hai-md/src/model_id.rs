//! Closed set of model identifiers
//!
//! Parsing a wire string into [`ModelId`] happens once at the request
//! boundary; past that point every per-model decision is an exhaustive match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a diagnosis model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    HeartDisease,
    MedicalCondition,
    CancerPrediction,
    DiabetesPrediction,
    KidneyStoneDetection,
}

/// How a model's raw classifier output becomes a predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    /// Positive-class probability compared against a 0.5 threshold
    BinaryRisk,
    /// Classifier label taken as-is, confidence from the top probability
    Labeled,
}

impl ModelId {
    /// All models, in registry load order
    pub const ALL: [ModelId; 5] = [
        ModelId::HeartDisease,
        ModelId::MedicalCondition,
        ModelId::CancerPrediction,
        ModelId::DiabetesPrediction,
        ModelId::KidneyStoneDetection,
    ];

    /// Wire identifier, also the bundle file stem
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::HeartDisease => "heart_disease",
            ModelId::MedicalCondition => "medical_condition",
            ModelId::CancerPrediction => "cancer_prediction",
            ModelId::DiabetesPrediction => "diabetes_prediction",
            ModelId::KidneyStoneDetection => "kidney_stone_detection",
        }
    }

    /// Sentence-case name used in user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::HeartDisease => "Heart disease",
            ModelId::MedicalCondition => "Medical condition",
            ModelId::CancerPrediction => "Cancer prediction",
            ModelId::DiabetesPrediction => "Diabetes prediction",
            ModelId::KidneyStoneDetection => "Kidney stone detection",
        }
    }

    pub fn prediction_mode(&self) -> PredictionMode {
        match self {
            ModelId::HeartDisease | ModelId::CancerPrediction => PredictionMode::BinaryRisk,
            ModelId::MedicalCondition
            | ModelId::DiabetesPrediction
            | ModelId::KidneyStoneDetection => PredictionMode::Labeled,
        }
    }

    /// Bundle directory name inside the models directory
    pub fn bundle_dir_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model id: {0}")]
pub struct UnknownModelId(pub String);

impl FromStr for ModelId {
    type Err = UnknownModelId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownModelId(s.to_string()))
    }
}

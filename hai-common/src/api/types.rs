//! Shared API request/response types
//!
//! Wire format of the diagnosis endpoint: a request naming a model and
//! carrying loosely-typed input, and the uniform clinical result returned for
//! every model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ========================================
// Diagnosis Request
// ========================================

/// Diagnosis dispatch request body
///
/// Both fields are optional at the wire level so that a missing field is
/// reported as an invalid request rather than a JSON rejection.
///
/// # Examples
///
/// ```
/// use hai_common::api::types::DispatchRequest;
///
/// let body = r#"{"model_name": "kidney_stone_detection", "input_data": {"ph": 6.1}}"#;
/// let request: DispatchRequest = serde_json::from_str(body).unwrap();
/// assert_eq!(request.model_id.as_deref(), Some("kidney_stone_detection"));
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DispatchRequest {
    /// Model identifier (`model_name` accepted for older clients)
    #[serde(default, alias = "model_name")]
    pub model_id: Option<String>,

    /// Raw field values keyed by field name
    #[serde(default)]
    pub input_data: Option<Value>,
}

// ========================================
// Diagnosis Result
// ========================================

/// Urgency tier used for downstream triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform clinical result returned by every model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PredictionResult {
    /// Human-readable condition label
    pub condition: String,

    /// Probability of the reported class as a percentage (0-100, 2 decimals)
    pub confidence: f64,

    /// Clinical specialty (e.g. "Cardiology")
    pub category: String,

    /// Recommended actions
    pub recommendations: Vec<String>,

    /// Urgency tier
    pub urgency: Urgency,

    /// Suggested next steps
    pub next_steps: Vec<String>,
}

// ========================================
// Error Response
// ========================================

/// Failure body: human-readable message plus a transport-neutral kind
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

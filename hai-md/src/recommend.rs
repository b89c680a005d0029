//! Recommendation composer
//!
//! Maps (model, predicted class, confidence) to the clinical result. Pure and
//! total: a class the tables do not know degrades to the negative row or a
//! generic label, never to an error.

use hai_common::api::types::{PredictionResult, Urgency};

use crate::inference::PredictedClass;
use crate::model_id::ModelId;

/// Static part of a result row
struct Row {
    category: &'static str,
    urgency: Urgency,
    recommendations: &'static [&'static str],
    next_steps: &'static [&'static str],
}

impl Row {
    fn finish(&self, condition: String, confidence: f64) -> PredictionResult {
        PredictionResult {
            condition,
            confidence,
            category: self.category.to_string(),
            recommendations: self.recommendations.iter().map(|s| s.to_string()).collect(),
            urgency: self.urgency,
            next_steps: self.next_steps.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

const HEART_POSITIVE: Row = Row {
    category: "Cardiology",
    urgency: Urgency::High,
    recommendations: &[
        "Consult a cardiologist.",
        "Maintain a healthy lifestyle.",
        "Regular check-ups.",
    ],
    next_steps: &["Schedule an appointment with a heart specialist."],
};

const HEART_NEGATIVE: Row = Row {
    category: "Cardiology",
    urgency: Urgency::Low,
    recommendations: &["Continue healthy habits.", "Regular check-ups."],
    next_steps: &["Monitor diet and exercise."],
};

const CANCER_POSITIVE: Row = Row {
    category: "Oncology",
    urgency: Urgency::High,
    recommendations: &[
        "Consult an oncologist for screening and early detection.",
        "Adopt healthy lifestyle changes.",
    ],
    next_steps: &["Discuss personalized screening options with a specialist."],
};

const CANCER_NEGATIVE: Row = Row {
    category: "Oncology",
    urgency: Urgency::Low,
    recommendations: &["Maintain healthy lifestyle.", "Regular check-ups."],
    next_steps: &["Continue monitoring and healthy living."],
};

const DIABETES_POSITIVE: Row = Row {
    category: "Endocrinology",
    urgency: Urgency::High,
    recommendations: &[
        "Consult an endocrinologist.",
        "Manage diet and exercise.",
        "Monitor blood glucose regularly.",
    ],
    next_steps: &["Schedule a consultation with a diabetes specialist."],
};

const DIABETES_NEGATIVE: Row = Row {
    category: "Endocrinology",
    urgency: Urgency::Low,
    recommendations: &["Maintain healthy lifestyle.", "Regular check-ups."],
    next_steps: &["Continue healthy living and monitor risk factors."],
};

const KIDNEY_POSITIVE: Row = Row {
    category: "Urology",
    urgency: Urgency::High,
    recommendations: &[
        "Consult a urologist.",
        "Increase fluid intake and dietary changes.",
        "Monitor symptoms.",
    ],
    next_steps: &["Schedule an appointment for further investigation and treatment options."],
};

const KIDNEY_NEGATIVE: Row = Row {
    category: "Urology",
    urgency: Urgency::Low,
    recommendations: &["Maintain healthy hydration.", "Regular check-ups."],
    next_steps: &["Continue healthy habits."],
};

const GENERAL: Row = Row {
    category: "General Medicine",
    urgency: Urgency::Medium,
    recommendations: &["Consult a general physician for further assessment."],
    next_steps: &["Schedule a follow-up appointment."],
};

/// Diabetes label that selects the high-urgency row
pub const DIABETES_POSITIVE_LABEL: &str = "Positive";

/// Build the result for a prediction
pub fn compose(model_id: ModelId, class: &PredictedClass, confidence: f64) -> PredictionResult {
    let positive = matches!(class, PredictedClass::Code(1));

    match model_id {
        ModelId::HeartDisease => {
            let (row, condition) = if positive {
                (&HEART_POSITIVE, "Heart Disease")
            } else {
                (&HEART_NEGATIVE, "No Heart Disease")
            };
            row.finish(condition.to_string(), confidence)
        }
        ModelId::CancerPrediction => {
            let (row, condition) = if positive {
                (&CANCER_POSITIVE, "High Risk of Cancer")
            } else {
                (&CANCER_NEGATIVE, "Low Risk of Cancer")
            };
            row.finish(condition.to_string(), confidence)
        }
        ModelId::KidneyStoneDetection => {
            let (row, condition) = if positive {
                (&KIDNEY_POSITIVE, "Kidney Stones Detected")
            } else {
                (&KIDNEY_NEGATIVE, "No Kidney Stones Detected")
            };
            row.finish(condition.to_string(), confidence)
        }
        ModelId::DiabetesPrediction => {
            let row = match class {
                PredictedClass::Label(label) if label == DIABETES_POSITIVE_LABEL => {
                    &DIABETES_POSITIVE
                }
                _ => &DIABETES_NEGATIVE,
            };
            row.finish(format!("Diabetes Prediction: {}", class), confidence)
        }
        ModelId::MedicalCondition => {
            let severity = match class {
                PredictedClass::Code(0) => "Mild",
                PredictedClass::Code(1) => "Moderate",
                PredictedClass::Code(2) => "Severe",
                _ => "Unknown",
            };
            GENERAL.finish(format!("{} Condition", severity), confidence)
        }
    }
}

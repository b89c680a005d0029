//! Schema-driven feature vector construction
//!
//! Raw request values are loosely typed JSON. Every field is coerced by the
//! rule its [`FieldKind`] names; a value that is missing or cannot be coerced
//! silently becomes the field default instead of failing the request. The
//! vector is always emitted in schema order, then scaled as a whole when the
//! model has a scaler.

use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::artifacts::{ArtifactError, LabelEncoder, Scaler};
use crate::schema::{CategoricalRule, FeatureSchema, FieldKind, FieldSpec};

/// Errors that are not ordinary bad input and therefore do fail the request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreprocessError {
    #[error("field '{field}' needs encoder '{encoder}', which the model does not provide")]
    MissingEncoder { field: String, encoder: String },

    #[error("scaling failed: {0}")]
    Scaling(#[from] ArtifactError),
}

/// Ordered numeric model input, one value per schema field
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Builds feature vectors using the encoders and scaler of one model
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor<'a> {
    encoders: &'a HashMap<String, LabelEncoder>,
    scaler: Option<&'a dyn Scaler>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(encoders: &'a HashMap<String, LabelEncoder>, scaler: Option<&'a dyn Scaler>) -> Self {
        Self { encoders, scaler }
    }

    /// Encode `raw` in schema order and apply the scaler, if any
    pub fn build_vector(
        &self,
        schema: &FeatureSchema,
        raw: &Map<String, Value>,
    ) -> Result<FeatureVector, PreprocessError> {
        let mut values = self.encode(schema, raw)?;
        if let Some(scaler) = self.scaler {
            scaler.transform(&mut values)?;
        }
        Ok(FeatureVector(values))
    }

    /// Encode `raw` in schema order without scaling
    pub fn encode(
        &self,
        schema: &FeatureSchema,
        raw: &Map<String, Value>,
    ) -> Result<Vec<f64>, PreprocessError> {
        schema
            .fields()
            .iter()
            .map(|field| self.encode_field(field, raw.get(&field.name)))
            .collect()
    }

    fn encode_field(&self, field: &FieldSpec, raw: Option<&Value>) -> Result<f64, PreprocessError> {
        let coerced = match &field.kind {
            FieldKind::Numeric => coerce_float(raw),
            FieldKind::Integer => coerce_integer(raw),
            FieldKind::Binary => Some(bool_code(truthy(raw))),
            FieldKind::Categorical(CategoricalRule::LiteralMatch { literal }) => {
                Some(bool_code(matches_literal(raw, literal)))
            }
            FieldKind::Categorical(CategoricalRule::Encoder {
                encoder,
                default_label,
            }) => {
                let encoder_ref = self.encoders.get(encoder).ok_or_else(|| {
                    PreprocessError::MissingEncoder {
                        field: field.name.clone(),
                        encoder: encoder.clone(),
                    }
                })?;
                Some(encode_label(encoder_ref, raw, default_label, &field.name))
            }
        };

        Ok(coerced.unwrap_or_else(|| {
            if is_present(raw) {
                debug!(field = %field.name, "value could not be coerced, using default");
            }
            field.default
        }))
    }
}

fn is_present(raw: Option<&Value>) -> bool {
    !matches!(raw, None | Some(Value::Null))
}

fn bool_code(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn encode_label(encoder: &LabelEncoder, raw: Option<&Value>, default_label: &str, field: &str) -> f64 {
    let label = raw.and_then(stringify);
    let code = label
        .as_deref()
        .and_then(|l| encoder.transform(l))
        .or_else(|| {
            if label.is_some() {
                debug!(field = %field, "unknown category, using default label");
            }
            encoder.transform(default_label)
        })
        // Default label absent from the encoder: first category
        .unwrap_or(0);
    code as f64
}

// ============================================================================
// Coercion rules
// ============================================================================

/// Float conversion: numbers, booleans and numeric strings (surrounding
/// whitespace ignored)
///
/// `"nan"` and `"inf"` parse like any other float. They are not defaulted
/// here; the graph runtime rejects non-finite features, which fails the
/// request as an inference failure.
pub fn coerce_float(raw: Option<&Value>) -> Option<f64> {
    match raw? {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(bool_code(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Integer conversion: integral numbers as-is, fractional numbers truncated
/// toward zero, booleans as 1/0, strings only if they spell an integer
pub fn coerce_integer(raw: Option<&Value>) -> Option<f64> {
    match raw? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i as f64)
            } else if let Some(u) = n.as_u64() {
                Some(u as f64)
            } else {
                n.as_f64().filter(|f| f.is_finite()).map(f64::trunc)
            }
        }
        Value::Bool(b) => Some(bool_code(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|i| i as f64),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Truthiness: null, false, zero, and empty strings/arrays/objects are false
pub fn truthy(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Case-insensitive string equality against an already-lowercase literal
pub fn matches_literal(raw: Option<&Value>, literal: &str) -> bool {
    matches!(raw, Some(Value::String(s)) if s.to_lowercase() == literal)
}

/// Category label of a raw value; `None` when the value is missing
///
/// Booleans render as `True`/`False` and whole floats keep a trailing `.0`,
/// which is how the encoders' training data spelled them.
pub fn stringify(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some(n.to_string())
            } else {
                let f = n.as_f64()?;
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
                    Some(format!("{:.1}", f))
                } else {
                    Some(f.to_string())
                }
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::graph::tests::fixture;
    use crate::artifacts::OnnxScaler;
    use crate::model_id::ModelId;
    use crate::schema::GENDER_ENCODER;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn no_encoders() -> HashMap<String, LabelEncoder> {
        HashMap::new()
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(coerce_float(Some(&json!(1.5))), Some(1.5));
        assert_eq!(coerce_float(Some(&json!(7))), Some(7.0));
        assert_eq!(coerce_float(Some(&json!(" 2.25 "))), Some(2.25));
        assert_eq!(coerce_float(Some(&json!("1e3"))), Some(1000.0));
        assert_eq!(coerce_float(Some(&json!(true))), Some(1.0));
        assert_eq!(coerce_float(Some(&json!("abc"))), None);
        assert_eq!(coerce_float(Some(&json!(""))), None);
        assert!(coerce_float(Some(&json!("nan"))).unwrap().is_nan());
        assert_eq!(coerce_float(Some(&json!("-inf"))), Some(f64::NEG_INFINITY));
        assert_eq!(coerce_float(Some(&json!([1.0]))), None);
        assert_eq!(coerce_float(Some(&Value::Null)), None);
        assert_eq!(coerce_float(None), None);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer(Some(&json!(3))), Some(3.0));
        assert_eq!(coerce_integer(Some(&json!(3.9))), Some(3.0));
        assert_eq!(coerce_integer(Some(&json!(-2.5))), Some(-2.0));
        assert_eq!(coerce_integer(Some(&json!(" 2 "))), Some(2.0));
        assert_eq!(coerce_integer(Some(&json!("2.0"))), None);
        assert_eq!(coerce_integer(Some(&json!(false))), Some(0.0));
        assert_eq!(coerce_integer(Some(&json!({"a": 1}))), None);
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&Value::Null)));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(0.0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!([]))));
        assert!(truthy(Some(&json!(2))));
        assert!(truthy(Some(&json!("0"))));
        assert!(truthy(Some(&json!("false"))));
        assert!(truthy(Some(&json!(true))));
    }

    #[test]
    fn test_matches_literal() {
        assert!(matches_literal(Some(&json!("Female")), "female"));
        assert!(matches_literal(Some(&json!("FEMALE")), "female"));
        assert!(!matches_literal(Some(&json!(" female")), "female"));
        assert!(!matches_literal(Some(&json!("male")), "female"));
        assert!(!matches_literal(Some(&json!(1)), "female"));
        assert!(!matches_literal(None, "female"));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!("M")), Some("M".to_string()));
        assert_eq!(stringify(&json!(1)), Some("1".to_string()));
        assert_eq!(stringify(&json!(1.0)), Some("1.0".to_string()));
        assert_eq!(stringify(&json!(2.5)), Some("2.5".to_string()));
        assert_eq!(stringify(&json!(true)), Some("True".to_string()));
        assert_eq!(stringify(&Value::Null), None);
    }

    #[test]
    fn test_cancer_vector_encoding() {
        let schema = FeatureSchema::for_model(ModelId::CancerPrediction).unwrap();
        let encoders = no_encoders();
        let pre = Preprocessor::new(&encoders, None);

        let raw = object(json!({
            "Age": "54",
            "Gender": "Female",
            "BMI": 27.3,
            "Smoking": true,
            "GeneticRisk": 0,
            "PhysicalActivity": 3.5,
            "AlcoholIntake": "n/a",
            "CancerHistory": "yes"
        }));

        let vector = pre.build_vector(&schema, &raw).unwrap();
        assert_eq!(vector.as_slice(), &[54.0, 1.0, 27.3, 1.0, 0.0, 3.5, 0.0, 1.0]);
    }

    #[test]
    fn test_cancer_gender_male_or_absent_is_zero() {
        let schema = FeatureSchema::for_model(ModelId::CancerPrediction).unwrap();
        let encoders = no_encoders();
        let pre = Preprocessor::new(&encoders, None);

        let male = pre.encode(&schema, &object(json!({"Gender": "male"}))).unwrap();
        let absent = pre.encode(&schema, &object(json!({"Age": 40}))).unwrap();
        let upper = pre.encode(&schema, &object(json!({"Gender": "fEmAlE"}))).unwrap();

        assert_eq!(male[1], 0.0);
        assert_eq!(absent[1], 0.0);
        assert_eq!(upper[1], 1.0);
    }

    #[test]
    fn test_heart_integer_columns_truncate() {
        let schema = FeatureSchema::for_model(ModelId::HeartDisease).unwrap();
        let encoders = no_encoders();
        let pre = Preprocessor::new(&encoders, None);

        let raw = object(json!({"age": "61.5", "cp": 2.7, "thal": "3.0", "oldpeak": "1.4"}));
        let vector = pre.encode(&schema, &raw).unwrap();

        assert_eq!(vector.len(), 13);
        assert_eq!(vector[0], 61.5);
        assert_eq!(vector[2], 2.0);
        // "3.0" is not an integer literal
        assert_eq!(vector[12], 0.0);
        assert_eq!(vector[9], 1.4);
    }

    #[test]
    fn test_diabetes_gender_encoder_with_default() {
        let schema = FeatureSchema::for_model(ModelId::DiabetesPrediction).unwrap();
        let mut encoders = HashMap::new();
        encoders.insert(GENDER_ENCODER.to_string(), LabelEncoder::new(["Female", "Male"]));
        let pre = Preprocessor::new(&encoders, None);

        let female = pre.encode(&schema, &object(json!({"GENDER": "Female"}))).unwrap();
        let missing = pre.encode(&schema, &object(json!({"AGE": 50}))).unwrap();
        let unknown = pre.encode(&schema, &object(json!({"GENDER": "X"}))).unwrap();

        assert_eq!(female[1], 0.0);
        assert_eq!(missing[1], 1.0);
        assert_eq!(unknown[1], 1.0);
    }

    #[test]
    fn test_default_label_outside_encoder_uses_first_code() {
        let schema = FeatureSchema::for_model(ModelId::DiabetesPrediction).unwrap();
        let mut encoders = HashMap::new();
        encoders.insert(GENDER_ENCODER.to_string(), LabelEncoder::new(["F", "M"]));
        let pre = Preprocessor::new(&encoders, None);

        let known = pre.encode(&schema, &object(json!({"GENDER": "M"}))).unwrap();
        let missing = pre.encode(&schema, &object(json!({}))).unwrap();

        assert_eq!(known[1], 1.0);
        assert_eq!(missing[1], 0.0);
    }

    #[test]
    fn test_missing_encoder_is_an_error() {
        let schema = FeatureSchema::for_model(ModelId::DiabetesPrediction).unwrap();
        let encoders = no_encoders();
        let pre = Preprocessor::new(&encoders, None);

        let err = pre.encode(&schema, &object(json!({"GENDER": "M"}))).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::MissingEncoder {
                field: "GENDER".to_string(),
                encoder: GENDER_ENCODER.to_string(),
            }
        );
    }

    #[test]
    fn test_scaler_applied_to_full_vector() {
        let schema = FeatureSchema::for_model(ModelId::KidneyStoneDetection).unwrap();
        let encoders = no_encoders();
        // (x - 1) / 2 on every column
        let scaler = OnnxScaler::from_bytes(&fixture("standard_scaler_6.onnx")).unwrap();
        let pre = Preprocessor::new(&encoders, Some(&scaler));

        let raw = object(json!({"gravity": 3, "ph": 5, "osmo": 1, "cond": 1, "urea": 1, "calc": 9}));
        let vector = pre.build_vector(&schema, &raw).unwrap();

        assert_eq!(vector.as_slice(), &[1.0, 2.0, 0.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_scaler_dimension_mismatch_fails() {
        let schema = FeatureSchema::for_model(ModelId::KidneyStoneDetection).unwrap();
        let encoders = no_encoders();
        let scaler = OnnxScaler::from_bytes(&fixture("identity_scaler_8.onnx")).unwrap();
        let pre = Preprocessor::new(&encoders, Some(&scaler));

        let err = pre.build_vector(&schema, &object(json!({"ph": 6.0}))).unwrap_err();
        assert!(matches!(err, PreprocessError::Scaling(ArtifactError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_non_finite_feature_fails_scaling() {
        let schema = FeatureSchema::for_model(ModelId::KidneyStoneDetection).unwrap();
        let encoders = no_encoders();
        let scaler = OnnxScaler::from_bytes(&fixture("identity_scaler_6.onnx")).unwrap();
        let pre = Preprocessor::new(&encoders, Some(&scaler));

        let err = pre.build_vector(&schema, &object(json!({"ph": "nan"}))).unwrap_err();
        assert!(matches!(err, PreprocessError::Scaling(ArtifactError::Evaluation(_))));
    }
}

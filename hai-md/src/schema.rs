//! Feature schemas: the ordered, typed input columns of each model
//!
//! A schema is pure data. Its field order is the column order the model and
//! scaler were fitted on and is never rearranged at runtime; the
//! [`preprocess`](crate::preprocess) module interprets it.

use serde_json::{Map, Value};

use crate::artifacts::LabelEncoder;
use crate::model_id::ModelId;
use std::collections::HashMap;

/// Per-field strategy for categorical columns
#[derive(Debug, Clone, PartialEq)]
pub enum CategoricalRule {
    /// Look the stringified value up in a named encoder of the model entry,
    /// substituting `default_label` when the value is missing or unknown
    Encoder {
        encoder: String,
        default_label: String,
    },
    /// 1 when the value is a string equal to `literal` ignoring case, else 0
    LiteralMatch { literal: String },
}

/// Coercion rule of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Floating point conversion
    Numeric,
    /// Integer conversion; fractional numbers truncate toward zero
    Integer,
    /// Truthiness mapped to 1/0
    Binary,
    Categorical(CategoricalRule),
}

/// One expected input column
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Value used when the raw value is missing or fails coercion
    pub default: f64,
}

impl FieldSpec {
    pub fn numeric(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Numeric)
    }

    pub fn integer(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Integer)
    }

    pub fn binary(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Binary)
    }

    pub fn encoded(name: &str, encoder: &str, default_label: &str) -> Self {
        Self::with_kind(
            name,
            FieldKind::Categorical(CategoricalRule::Encoder {
                encoder: encoder.to_string(),
                default_label: default_label.to_string(),
            }),
        )
    }

    pub fn literal_match(name: &str, literal: &str) -> Self {
        Self::with_kind(
            name,
            FieldKind::Categorical(CategoricalRule::LiteralMatch {
                literal: literal.to_lowercase(),
            }),
        )
    }

    fn with_kind(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: 0.0,
        }
    }
}

/// Ordered field list of one model
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Names of encoders the schema expects the model entry to provide
    pub fn required_encoders(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Categorical(CategoricalRule::Encoder { encoder, .. }) => {
                Some(encoder.as_str())
            }
            _ => None,
        })
    }

    /// Fixed schema of a model; `None` for models whose columns come from the bundle
    pub fn for_model(model_id: ModelId) -> Option<Self> {
        match model_id {
            ModelId::HeartDisease => Some(heart_disease()),
            ModelId::CancerPrediction => Some(cancer_prediction()),
            ModelId::DiabetesPrediction => Some(diabetes_prediction()),
            ModelId::KidneyStoneDetection => Some(kidney_stone_detection()),
            ModelId::MedicalCondition => None,
        }
    }

    /// Schema from bundle-declared column names
    ///
    /// A column with a same-named encoder is categorical, defaulting to the
    /// encoder's first class; every other column is numeric.
    pub fn from_feature_names(names: &[String], encoders: &HashMap<String, LabelEncoder>) -> Self {
        let fields = names
            .iter()
            .map(|name| match encoders.get(name).and_then(|e| e.classes().first()) {
                Some(default_label) => FieldSpec::encoded(name, name, default_label),
                None => FieldSpec::numeric(name),
            })
            .collect();
        Self::new(fields)
    }

    /// All-numeric schema over the keys of `input`, sorted by name
    ///
    /// Used for free-form models with no declared columns so that the
    /// vector layout never depends on how the caller ordered its keys.
    pub fn from_input_keys(input: &Map<String, Value>) -> Self {
        let mut names: Vec<&String> = input.keys().collect();
        names.sort();
        Self::new(names.into_iter().map(|n| FieldSpec::numeric(n)).collect())
    }
}

// ============================================================================
// Fixed schemas
// ============================================================================

fn heart_disease() -> FeatureSchema {
    FeatureSchema::new(vec![
        FieldSpec::numeric("age"),
        FieldSpec::integer("sex"),
        FieldSpec::integer("cp"),
        FieldSpec::numeric("trestbps"),
        FieldSpec::numeric("chol"),
        FieldSpec::integer("fbs"),
        FieldSpec::integer("restecg"),
        FieldSpec::numeric("thalach"),
        FieldSpec::integer("exang"),
        FieldSpec::numeric("oldpeak"),
        FieldSpec::integer("slope"),
        FieldSpec::integer("ca"),
        FieldSpec::integer("thal"),
    ])
}

fn cancer_prediction() -> FeatureSchema {
    FeatureSchema::new(vec![
        FieldSpec::numeric("Age"),
        FieldSpec::literal_match("Gender", "female"),
        FieldSpec::numeric("BMI"),
        FieldSpec::binary("Smoking"),
        FieldSpec::binary("GeneticRisk"),
        FieldSpec::numeric("PhysicalActivity"),
        FieldSpec::numeric("AlcoholIntake"),
        FieldSpec::binary("CancerHistory"),
    ])
}

/// Encoder names bound to the diabetes model
pub const GENDER_ENCODER: &str = "gender";
pub const CLASS_ENCODER: &str = "class";

fn diabetes_prediction() -> FeatureSchema {
    FeatureSchema::new(vec![
        FieldSpec::numeric("AGE"),
        FieldSpec::encoded("GENDER", GENDER_ENCODER, "Male"),
        FieldSpec::numeric("UREA"),
        FieldSpec::numeric("CR"),
        FieldSpec::numeric("HBA1C"),
        FieldSpec::numeric("CHOL"),
        FieldSpec::numeric("TG"),
        FieldSpec::numeric("HDL"),
        FieldSpec::numeric("LDL"),
        FieldSpec::numeric("VLDL"),
        FieldSpec::numeric("BMI"),
    ])
}

fn kidney_stone_detection() -> FeatureSchema {
    FeatureSchema::new(
        ["gravity", "ph", "osmo", "cond", "urea", "calc"]
            .into_iter()
            .map(FieldSpec::numeric)
            .collect(),
    )
}

//! Classifier contract and its ONNX implementation
//!
//! The rest of the service only sees [`Classifier`]: class labels plus
//! `predict_proba` / `predict`. Bundled models are [`OnnxClassifier`]s.

use std::collections::HashSet;
use std::fmt;

use super::{ArtifactError, OnnxGraph};

/// Numeric class label as emitted by the training pipeline
pub type ClassLabel = i64;

/// Predict / predict-probability contract of a fitted classifier
///
/// `predict_proba` returns one probability per entry of `classes()`, in the
/// same order.
pub trait Classifier: Send + Sync + fmt::Debug {
    fn classes(&self) -> &[ClassLabel];

    /// Number of input features, if the classifier knows it
    fn n_features(&self) -> Option<usize>;

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ArtifactError>;

    /// Most probable class; ties resolve to the first class
    fn predict(&self, features: &[f64]) -> Result<ClassLabel, ArtifactError> {
        let proba = self.predict_proba(features)?;
        let idx = argmax(&proba)
            .ok_or_else(|| ArtifactError::Evaluation("empty probability output".to_string()))?;
        self.classes().get(idx).copied().ok_or_else(|| {
            ArtifactError::Evaluation(format!(
                "probability index {} has no class (classes: {:?})",
                idx,
                self.classes()
            ))
        })
    }
}

/// Index of the first maximum value
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Classifier graph whose last output is the class probability row
///
/// Exporters put the probabilities after the label output, so only the
/// last output is read. Class labels are not recoverable from the graph and
/// come from the bundle manifest.
#[derive(Debug)]
pub struct OnnxClassifier {
    graph: OnnxGraph,
    classes: Vec<ClassLabel>,
}

impl OnnxClassifier {
    pub fn new(graph: OnnxGraph, classes: Vec<ClassLabel>) -> Result<Self, ArtifactError> {
        if classes.len() < 2 {
            return Err(ArtifactError::InvalidParameters(format!(
                "classifier needs at least two classes, got {}",
                classes.len()
            )));
        }
        let unique: HashSet<ClassLabel> = classes.iter().copied().collect();
        if unique.len() != classes.len() {
            return Err(ArtifactError::InvalidParameters(format!(
                "classifier classes are not unique: {:?}",
                classes
            )));
        }
        if let Some(width) = graph.n_outputs() {
            if width != classes.len() {
                return Err(ArtifactError::InvalidParameters(format!(
                    "graph emits {} probabilities for {} classes",
                    width,
                    classes.len()
                )));
            }
        }
        Ok(Self { graph, classes })
    }

    pub fn from_bytes(bytes: &[u8], classes: Vec<ClassLabel>) -> Result<Self, ArtifactError> {
        Self::new(OnnxGraph::from_bytes(bytes)?, classes)
    }
}

impl Classifier for OnnxClassifier {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.graph.n_inputs())
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ArtifactError> {
        let proba = self.graph.run(features)?;
        if proba.len() != self.classes.len() {
            return Err(ArtifactError::Evaluation(format!(
                "graph returned {} probabilities for {} classes",
                proba.len(),
                self.classes.len()
            )));
        }
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::graph::tests::fixture;

    #[test]
    fn test_argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_kidney_graph_probabilities() {
        let model = OnnxClassifier::from_bytes(&fixture("kidney_classifier.onnx"), vec![0, 1]).unwrap();
        assert_eq!(model.n_features(), Some(6));

        // Positive score is calc - 2
        let proba = model.predict_proba(&[0.0, 0.0, 0.0, 0.0, 0.0, 3.5]).unwrap();
        let expected = 1.0 / (1.0 + (-1.5f64).exp());
        assert!((proba[1] - expected).abs() < 1e-6);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-6);
        assert_eq!(model.predict(&[0.0, 0.0, 0.0, 0.0, 0.0, 3.5]).unwrap(), 1);
        assert_eq!(model.predict(&[0.0; 6]).unwrap(), 0);
    }

    #[test]
    fn test_predict_maps_index_to_class_label() {
        let model =
            OnnxClassifier::from_bytes(&fixture("medical_classifier.onnx"), vec![10, 20, 30]).unwrap();
        assert_eq!(model.predict(&[1.0, 40.0]).unwrap(), 20);
    }

    #[test]
    fn test_class_count_must_match_graph_output() {
        let err =
            OnnxClassifier::from_bytes(&fixture("kidney_classifier.onnx"), vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidParameters(_)));

        let err = OnnxClassifier::from_bytes(&fixture("kidney_classifier.onnx"), vec![1, 1]).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidParameters(_)));
    }

    #[test]
    fn test_wrong_width_is_a_dimension_error() {
        let model = OnnxClassifier::from_bytes(&fixture("cancer_classifier.onnx"), vec![0, 1]).unwrap();
        assert_eq!(
            model.predict_proba(&[0.0; 13]),
            Err(ArtifactError::DimensionMismatch { expected: 8, actual: 13 })
        );
    }
}

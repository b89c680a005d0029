//! Fitted feature scalers
//!
//! A scaler is fitted across every column of the model's schema, including
//! encoded categorical and binary columns, so it is always applied to the
//! full ordered vector.

use std::fmt;

use super::{ArtifactError, OnnxGraph};

/// Column-wise transform applied to a whole feature vector
pub trait Scaler: Send + Sync + fmt::Debug {
    fn n_features(&self) -> usize;

    /// Scale `features` in place
    fn transform(&self, features: &mut [f64]) -> Result<(), ArtifactError>;
}

/// Scaler graph mapping `[1, n]` to `[1, n]`
#[derive(Debug)]
pub struct OnnxScaler {
    graph: OnnxGraph,
}

impl OnnxScaler {
    pub fn new(graph: OnnxGraph) -> Result<Self, ArtifactError> {
        if let Some(width) = graph.n_outputs() {
            if width != graph.n_inputs() {
                return Err(ArtifactError::InvalidParameters(format!(
                    "scaler maps {} columns to {}",
                    graph.n_inputs(),
                    width
                )));
            }
        }
        Ok(Self { graph })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        Self::new(OnnxGraph::from_bytes(bytes)?)
    }
}

impl Scaler for OnnxScaler {
    fn n_features(&self) -> usize {
        self.graph.n_inputs()
    }

    fn transform(&self, features: &mut [f64]) -> Result<(), ArtifactError> {
        let scaled = self.graph.run(features)?;
        if scaled.len() != features.len() {
            return Err(ArtifactError::Evaluation(format!(
                "scaler returned {} values for {} columns",
                scaled.len(),
                features.len()
            )));
        }
        features.copy_from_slice(&scaled);
        Ok(())
    }
}

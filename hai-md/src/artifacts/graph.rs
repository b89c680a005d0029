//! ONNX graph execution through tract
//!
//! Exported pipelines take a single float input of shape
//! `[batch, features]`. The feature width is read from the graph's declared
//! input, the batch dimension is pinned to one row, and the graph is
//! optimized once at load. Running the resulting plan only borrows it, so
//! one plan serves every request.

use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;

use tract_onnx::pb::{self, tensor_shape_proto::dimension, type_proto};
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::internal::DimLike;

use super::{check_dimension, ArtifactError};

/// Optimized single-row ONNX graph
pub struct OnnxGraph {
    plan: TypedRunnableModel<TypedModel>,
    n_inputs: usize,
    n_outputs: Option<usize>,
}

impl fmt::Debug for OnnxGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxGraph")
            .field("n_inputs", &self.n_inputs)
            .field("n_outputs", &self.n_outputs)
            .finish()
    }
}

impl OnnxGraph {
    /// Parse and optimize a serialized ONNX model
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let onnx = tract_onnx::onnx();
        let proto = onnx
            .proto_model_for_read(&mut Cursor::new(bytes))
            .map_err(|e| ArtifactError::InvalidGraph(format!("{:#}", e)))?;
        Self::from_proto(&proto)
    }

    pub fn from_proto(proto: &pb::ModelProto) -> Result<Self, ArtifactError> {
        let n_inputs = declared_width(proto)?;
        let plan = tract_onnx::onnx()
            .model_for_proto_model(proto)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, n_inputs]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ArtifactError::InvalidGraph(format!("{:#}", e)))?;
        let n_outputs = last_output_width(plan.model());

        Ok(Self {
            plan,
            n_inputs,
            n_outputs,
        })
    }

    /// Feature width of the graph input
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Width of the last output, when the optimized graph fixes it
    pub fn n_outputs(&self) -> Option<usize> {
        self.n_outputs
    }

    /// Run one row through the graph and return its last output, flattened
    pub fn run(&self, features: &[f64]) -> Result<Vec<f64>, ArtifactError> {
        check_dimension(self.n_inputs, features)?;
        if let Some(idx) = features.iter().position(|x| !x.is_finite()) {
            return Err(ArtifactError::Evaluation(format!(
                "feature {} is not finite",
                idx
            )));
        }

        let row: Vec<f32> = features.iter().map(|&x| x as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.n_inputs), row)
            .map_err(|e| ArtifactError::Evaluation(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| ArtifactError::Evaluation(format!("{:#}", e)))?;
        let last = outputs
            .last()
            .ok_or_else(|| ArtifactError::Evaluation("graph produced no outputs".to_string()))?;
        let view = last
            .to_array_view::<f32>()
            .map_err(|e| ArtifactError::Evaluation(format!("last output is not f32: {}", e)))?;

        Ok(view.iter().map(|&v| f64::from(v)).collect())
    }
}

/// Last dimension of the first non-initializer graph input
fn declared_width(proto: &pb::ModelProto) -> Result<usize, ArtifactError> {
    let graph = proto
        .graph
        .as_ref()
        .ok_or_else(|| ArtifactError::InvalidGraph("model has no graph".to_string()))?;

    // Older exporters list initializers among the inputs
    let initializers: HashSet<&str> = graph.initializer.iter().map(|t| t.name.as_str()).collect();
    let input = graph
        .input
        .iter()
        .find(|input| !initializers.contains(input.name.as_str()))
        .ok_or_else(|| ArtifactError::InvalidGraph("graph has no input".to_string()))?;

    let shape = match input.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(type_proto::Value::TensorType(tensor)) => tensor.shape.as_ref(),
        _ => None,
    }
    .ok_or_else(|| {
        ArtifactError::InvalidGraph(format!("input '{}' has no tensor shape", input.name))
    })?;

    if shape.dim.len() != 2 {
        return Err(ArtifactError::InvalidGraph(format!(
            "input '{}' has rank {}, expected [batch, features]",
            input.name,
            shape.dim.len()
        )));
    }
    match shape.dim[1].value.as_ref() {
        Some(dimension::Value::DimValue(width)) if *width > 0 => Ok(*width as usize),
        _ => Err(ArtifactError::InvalidGraph(format!(
            "input '{}' has no fixed feature dimension",
            input.name
        ))),
    }
}

fn last_output_width(model: &TypedModel) -> Option<usize> {
    let ix = model.outputs.len().checked_sub(1)?;
    let fact = model.output_fact(ix).ok()?;
    fact.shape.last()?.to_usize().ok()
}

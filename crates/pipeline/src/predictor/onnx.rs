//! ONNX Runtime inference using tract
//!
//! Runs regression models exported to ONNX (for example from scikit-learn)
//! with a single `[1, 8]` f32 input and a single scalar output.

use super::{ModelError, RegressionModel};
use crate::models::FeatureVector;
use anyhow::Context;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-based regression model
pub struct OnnxModel {
    plan: TractModel,
    version: String,
}

impl OnnxModel {
    /// Parse and optimize an ONNX model from bytes
    pub fn from_bytes(model_bytes: &[u8], version: impl Into<String>) -> Result<Self, ModelError> {
        let plan = Self::load_plan(model_bytes).map_err(|e| ModelError::Load(format!("{e:#}")))?;
        Ok(Self {
            plan,
            version: version.into(),
        })
    }

    fn load_plan(model_bytes: &[u8]) -> anyhow::Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?;

        if model.inputs.is_empty() {
            anyhow::bail!("ONNX model declares no inputs");
        }

        let plan = model
            .with_input_fact(0, f32::fact([1, FeatureVector::LEN]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(plan)
    }

    fn features_to_tensor(features: &FeatureVector) -> Result<Tensor, ModelError> {
        let data = features.to_array().to_vec();
        let array = tract_ndarray::Array2::from_shape_vec((1, FeatureVector::LEN), data)
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        Ok(array.into())
    }

    fn run(&self, features: &FeatureVector) -> anyhow::Result<f64> {
        let input = Self::features_to_tensor(features)?;
        let outputs = self.plan.run(tvec!(input.into()))?;
        let output = outputs.first().context("No output from model")?;
        let output = output.cast_to::<f32>()?;
        let view = output.to_array_view::<f32>()?;
        let value = view.iter().next().copied().context("Empty model output")?;
        Ok(value as f64)
    }
}

impl RegressionModel for OnnxModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let start = Instant::now();

        let value = self
            .run(features)
            .map_err(|e| ModelError::Inference(format!("{e:#}")))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ModelError::NonFinite(value))
        }
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

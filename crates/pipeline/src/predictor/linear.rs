//! Linear regression weights stored as JSON
//!
//! `{"intercept": f64, "coefficients": [f64; 8]}`, coefficients in
//! [`FeatureVector::NAMES`] order.

use super::{ModelError, RegressionModel};
use crate::models::FeatureVector;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LinearWeights {
    intercept: f64,
    coefficients: Vec<f64>,
}

/// Linear model: `intercept + Σ coefficient·feature`
#[derive(Debug, Clone)]
pub struct LinearModel {
    intercept: f64,
    coefficients: [f64; FeatureVector::LEN],
    version: String,
}

impl LinearModel {
    pub fn new(
        intercept: f64,
        coefficients: [f64; FeatureVector::LEN],
        version: impl Into<String>,
    ) -> Self {
        Self {
            intercept,
            coefficients,
            version: version.into(),
        }
    }

    pub fn from_json(bytes: &[u8], version: impl Into<String>) -> Result<Self, ModelError> {
        let weights: LinearWeights = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::Load(format!("invalid linear weights: {e}")))?;

        let coefficients: [f64; FeatureVector::LEN] =
            weights.coefficients.try_into().map_err(|c: Vec<f64>| {
                ModelError::Load(format!(
                    "expected {} coefficients, got {}",
                    FeatureVector::LEN,
                    c.len()
                ))
            })?;

        Ok(Self::new(weights.intercept, coefficients, version))
    }
}

impl RegressionModel for LinearModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        let score = features
            .to_array()
            .iter()
            .zip(self.coefficients.iter())
            .fold(self.intercept, |acc, (x, w)| acc + *x as f64 * w);

        if score.is_finite() {
            Ok(score)
        } else {
            Err(ModelError::NonFinite(score))
        }
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

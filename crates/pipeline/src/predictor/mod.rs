//! Regression model adapters
//!
//! The pipeline treats the model as a black box behind [`RegressionModel`].
//! Models are loaded once at predictor startup through a [`ModelLoader`];
//! a failed load puts the predictor into its degraded state for good.

mod features;
mod linear;
mod onnx;

pub use features::extract_features;
pub use linear::LinearModel;
pub use onnx::OnnxModel;

use crate::models::FeatureVector;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Length of the hex fingerprint used as model version
const VERSION_HEX_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no model path configured")]
    NotConfigured,
    #[error("failed to read model file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported model format {0:?}")]
    UnsupportedFormat(String),
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model returned non-finite score {0}")]
    NonFinite(f64),
    #[error("model panicked during inference")]
    Panicked,
}

/// A loaded regression model
pub trait RegressionModel: Send + Sync {
    /// Score one feature vector
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError>;

    /// Version label of the loaded weights
    fn version(&self) -> &str;

    /// Short name of the model format
    fn kind(&self) -> &'static str;
}

/// Source of the model, invoked once by the predictor's startup handler
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn RegressionModel>, ModelError>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> Result<Arc<dyn RegressionModel>, ModelError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn RegressionModel>, ModelError> {
        self()
    }
}

/// Loads a model file, choosing the adapter by extension
#[derive(Debug, Clone)]
pub struct FileModelLoader {
    path: Option<PathBuf>,
}

impl FileModelLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self) -> Result<Arc<dyn RegressionModel>, ModelError> {
        let path = self.path.as_deref().ok_or(ModelError::NotConfigured)?;
        load_model_file(path)
    }
}

/// Load `.onnx` models through tract and `.json` files as linear weights
pub fn load_model_file(path: &Path) -> Result<Arc<dyn RegressionModel>, ModelError> {
    let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let version = fingerprint(&bytes);

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let model: Arc<dyn RegressionModel> = match extension.as_str() {
        "onnx" => Arc::new(OnnxModel::from_bytes(&bytes, version)?),
        "json" => Arc::new(LinearModel::from_json(&bytes, version)?),
        other => return Err(ModelError::UnsupportedFormat(other.to_string())),
    };

    info!(
        path = %path.display(),
        kind = model.kind(),
        version = %model.version(),
        "Model file loaded"
    );
    Ok(model)
}

/// Short SHA-256 fingerprint of model bytes
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    digest[..VERSION_HEX_LEN].to_string()
}

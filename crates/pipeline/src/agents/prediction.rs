//! Prediction agent
//!
//! Loads the model once at startup. `Unloaded → Loaded` or
//! `Unloaded → LoadFailed`; a failed load is final. Without a usable model,
//! valid readings still go downstream, unscored. Readings that fail
//! validation are dropped.

use super::Telemetry;
use crate::bus::{Agent, AgentAddress, AgentContext, Envelope};
use crate::health::components;
use crate::models::{FeatureVector, Message, MessageKind, Prediction};
use crate::observability::{drop_reasons, skip_reasons};
use crate::predictor::{extract_features, ModelError, ModelLoader, RegressionModel};
use async_trait::async_trait;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Inference slower than this counts towards `vitals_slow_inferences_total`
const SLOW_PREDICTION: Duration = Duration::from_millis(5);

/// Lifecycle of the regression model held by the predictor
pub enum ModelState {
    Unloaded,
    Loaded(Arc<dyn RegressionModel>),
    LoadFailed(String),
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Unloaded => f.write_str("Unloaded"),
            ModelState::Loaded(model) => f
                .debug_tuple("Loaded")
                .field(&format_args!("{}@{}", model.kind(), model.version()))
                .finish(),
            ModelState::LoadFailed(reason) => f.debug_tuple("LoadFailed").field(reason).finish(),
        }
    }
}

/// Scores readings and forwards them, enriched, downstream
pub struct PredictionAgent {
    address: AgentAddress,
    downstream: AgentAddress,
    loader: Arc<dyn ModelLoader>,
    state: ModelState,
    telemetry: Telemetry,
}

impl PredictionAgent {
    pub fn new(
        address: AgentAddress,
        downstream: AgentAddress,
        loader: Arc<dyn ModelLoader>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            address,
            downstream,
            loader,
            state: ModelState::Unloaded,
            telemetry,
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    async fn load_model(&mut self) {
        let loader = self.loader.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load())
            .await
            .unwrap_or_else(|e| Err(ModelError::Load(format!("model loader panicked: {e}"))));

        match loaded {
            Ok(model) => {
                self.telemetry
                    .metrics
                    .set_model_version(model.version(), model.kind());
                self.telemetry
                    .logger
                    .log_model_loaded(model.kind(), model.version());
                self.telemetry.health.set_healthy(components::PREDICTOR).await;
                self.state = ModelState::Loaded(model);
            }
            Err(e) => {
                let reason = e.to_string();
                self.telemetry.logger.log_model_load_failed(&reason);
                self.telemetry
                    .health
                    .set_degraded(components::PREDICTOR, format!("model unavailable: {reason}"))
                    .await;
                self.state = ModelState::LoadFailed(reason);
            }
        }
    }

    fn drop_message(&self, sequence: u64, reason: &str, details: &str) {
        self.telemetry.metrics.inc_messages_dropped(reason);
        self.telemetry.logger.log_dropped(sequence, reason, details);
    }

    /// Send the reading on without a prediction
    fn skip_prediction(&self, ctx: &AgentContext, message: Message, reason: &str, details: &str) {
        self.telemetry.metrics.inc_predictions_skipped(reason);
        self.telemetry
            .logger
            .log_prediction_skipped(message.sequence, reason, details);
        self.forward(ctx, message);
    }

    fn forward(&self, ctx: &AgentContext, message: Message) {
        if let Err(e) = ctx.send(&self.downstream, message) {
            self.telemetry
                .metrics
                .inc_delivery_failures(self.downstream.as_str());
            self.telemetry.logger.log_delivery_failed(
                self.address.as_str(),
                self.downstream.as_str(),
                &e.to_string(),
            );
        }
    }

    fn score(&self, ctx: &AgentContext, message: Message) {
        let features = match extract_features(&message.reading) {
            Ok(features) => features,
            Err(e) => {
                return self.drop_message(message.sequence, drop_reasons::VALIDATION, &e.to_string());
            }
        };

        let model = match &self.state {
            ModelState::Loaded(model) => model.clone(),
            ModelState::LoadFailed(reason) => {
                let reason = reason.clone();
                return self.skip_prediction(ctx, message, skip_reasons::MODEL_UNAVAILABLE, &reason);
            }
            ModelState::Unloaded => {
                return self.skip_prediction(
                    ctx,
                    message,
                    skip_reasons::MODEL_UNAVAILABLE,
                    "model not loaded",
                );
            }
        };

        let start = Instant::now();
        let result = guarded_predict(model.as_ref(), &features);
        let elapsed = start.elapsed();
        self.telemetry
            .metrics
            .observe_prediction_latency(elapsed.as_secs_f64());
        if elapsed > SLOW_PREDICTION {
            self.telemetry.metrics.inc_slow_inferences();
        }

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                let details = e.to_string();
                return self.skip_prediction(ctx, message, skip_reasons::MODEL_ERROR, &details);
            }
        };

        let prediction = Prediction {
            index: message.sequence,
            value,
        };
        self.telemetry.metrics.inc_predictions_generated();
        self.telemetry
            .logger
            .log_prediction(prediction.index, prediction.value, model.version());

        self.forward(ctx, message.with_prediction(prediction));
    }
}

/// Run the model, turning a panic inside it into an error
fn guarded_predict(model: &dyn RegressionModel, features: &FeatureVector) -> Result<f64, ModelError> {
    catch_unwind(AssertUnwindSafe(|| model.predict(features))).unwrap_or(Err(ModelError::Panicked))
}

#[async_trait]
impl Agent for PredictionAgent {
    fn address(&self) -> &AgentAddress {
        &self.address
    }

    async fn on_startup(&mut self, _ctx: &AgentContext) {
        self.load_model().await;
    }

    async fn on_message(&mut self, ctx: &AgentContext, envelope: Envelope) {
        let message = envelope.message;
        match message.kind() {
            MessageKind::Reading => self.score(ctx, message),
            MessageKind::Enriched => {
                debug!(from = %envelope.sender, "Predictor received an already scored reading");
                self.drop_message(
                    message.sequence,
                    drop_reasons::UNEXPECTED_KIND,
                    "reading already carries a prediction",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingModel;

    impl RegressionModel for PanickingModel {
        fn predict(&self, _features: &FeatureVector) -> Result<f64, ModelError> {
            panic!("broken weights")
        }

        fn version(&self) -> &str {
            "panics"
        }

        fn kind(&self) -> &'static str {
            "test"
        }
    }

    #[test]
    fn test_model_panic_becomes_error() {
        let features = FeatureVector {
            heart_rate: 70.0,
            systolic: 120.0,
            diastolic: 80.0,
            temperature: 37.0,
            moisture: 0.5,
            body_water_content: 55.0,
            fatigue_level: 2.0,
            drowsiness_level: 1.0,
        };
        assert!(matches!(
            guarded_predict(&PanickingModel, &features),
            Err(ModelError::Panicked)
        ));
    }

    #[test]
    fn test_model_state_debug() {
        assert_eq!(format!("{:?}", ModelState::Unloaded), "Unloaded");
        assert!(!ModelState::LoadFailed("gone".into()).is_loaded());
    }
}

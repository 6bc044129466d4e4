//! Prometheus metrics and structured lifecycle logging
//!
//! Metrics live in the process-global prometheus registry and are registered
//! once; [`PipelineMetrics`] is a cheap handle onto them.

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

static GLOBAL_METRICS: OnceLock<MetricsInner> = OnceLock::new();

struct MetricsInner {
    readings_generated: IntCounter,
    predictions_generated: IntCounter,
    messages_dropped: IntCounterVec,
    predictions_skipped: IntCounterVec,
    slow_inferences: IntCounter,
    delivery_failures: IntCounterVec,
    prediction_latency_seconds: Histogram,
    buffered_readings: IntGauge,
    model_version_info: GaugeVec,
}

impl MetricsInner {
    fn new() -> Self {
        Self {
            readings_generated: register_int_counter!(
                "vitals_readings_generated_total",
                "Readings produced by the generator"
            )
            .expect("Failed to register readings_generated"),

            predictions_generated: register_int_counter!(
                "vitals_predictions_generated_total",
                "Predictions produced by the model"
            )
            .expect("Failed to register predictions_generated"),

            messages_dropped: register_int_counter_vec!(
                "vitals_messages_dropped_total",
                "Messages dropped by the predictor",
                &["reason"]
            )
            .expect("Failed to register messages_dropped"),

            predictions_skipped: register_int_counter_vec!(
                "vitals_predictions_skipped_total",
                "Readings forwarded to the store without a prediction",
                &["reason"]
            )
            .expect("Failed to register predictions_skipped"),

            slow_inferences: register_int_counter!(
                "vitals_slow_inferences_total",
                "Model invocations slower than the latency target"
            )
            .expect("Failed to register slow_inferences"),

            delivery_failures: register_int_counter_vec!(
                "vitals_delivery_failures_total",
                "Messages that could not be delivered to a mailbox",
                &["target"]
            )
            .expect("Failed to register delivery_failures"),

            prediction_latency_seconds: register_histogram!(
                "vitals_prediction_latency_seconds",
                "Time spent in model inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            buffered_readings: register_int_gauge!(
                "vitals_buffered_readings",
                "Readings currently held in the shared store"
            )
            .expect("Failed to register buffered_readings"),

            model_version_info: register_gauge_vec!(
                "vitals_model_version_info",
                "Currently loaded regression model",
                &["version", "kind"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Handle to the global pipeline metrics; clones share the same series
#[derive(Clone)]
pub struct PipelineMetrics {
    inner: &'static MetricsInner,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics").finish_non_exhaustive()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(MetricsInner::new),
        }
    }

    pub fn inc_readings_generated(&self) {
        self.inner.readings_generated.inc();
    }

    pub fn inc_predictions_generated(&self) {
        self.inner.predictions_generated.inc();
    }

    pub fn inc_messages_dropped(&self, reason: &str) {
        self.inner.messages_dropped.with_label_values(&[reason]).inc();
    }

    pub fn inc_predictions_skipped(&self, reason: &str) {
        self.inner.predictions_skipped.with_label_values(&[reason]).inc();
    }

    pub fn inc_slow_inferences(&self) {
        self.inner.slow_inferences.inc();
    }

    pub fn inc_delivery_failures(&self, target: &str) {
        self.inner.delivery_failures.with_label_values(&[target]).inc();
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner.prediction_latency_seconds.observe(duration_secs);
    }

    pub fn set_buffered_readings(&self, count: usize) {
        self.inner.buffered_readings.set(count as i64);
    }

    pub fn set_model_version(&self, version: &str, kind: &str) {
        self.inner.model_version_info.reset();
        self.inner
            .model_version_info
            .with_label_values(&[version, kind])
            .set(1.0);
    }

    pub fn messages_dropped(&self, reason: &str) -> u64 {
        self.inner.messages_dropped.with_label_values(&[reason]).get()
    }

    pub fn predictions_skipped(&self, reason: &str) -> u64 {
        self.inner.predictions_skipped.with_label_values(&[reason]).get()
    }

    pub fn slow_inferences(&self) -> u64 {
        self.inner.slow_inferences.get()
    }

    pub fn delivery_failures(&self, target: &str) -> u64 {
        self.inner.delivery_failures.with_label_values(&[target]).get()
    }
}

/// Drop reasons used as the `reason` label
pub mod drop_reasons {
    pub const VALIDATION: &str = "validation";
    pub const UNEXPECTED_KIND: &str = "unexpected_kind";
}

/// Reasons a valid reading reaches the store without a prediction
pub mod skip_reasons {
    pub const MODEL_UNAVAILABLE: &str = "model_unavailable";
    pub const MODEL_ERROR: &str = "model_error";
}

/// Named lifecycle events with consistent fields
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, agents: &[String]) {
        info!(
            event = "pipeline_started",
            instance = %self.instance,
            version = %version,
            agents = ?agents,
            "Vitals pipeline started"
        );
    }

    pub fn log_prediction(&self, index: u64, value: f64, model_version: &str) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            index = index,
            value = value,
            model_version = %model_version,
            "Generated efficiency prediction"
        );
    }

    pub fn log_dropped(&self, sequence: u64, reason: &str, details: &str) {
        warn!(
            event = "message_dropped",
            instance = %self.instance,
            sequence = sequence,
            reason = %reason,
            details = %details,
            "Message dropped"
        );
    }

    pub fn log_prediction_skipped(&self, sequence: u64, reason: &str, details: &str) {
        warn!(
            event = "prediction_skipped",
            instance = %self.instance,
            sequence = sequence,
            reason = %reason,
            details = %details,
            "Reading recorded without a prediction"
        );
    }

    pub fn log_delivery_failed(&self, from: &str, to: &str, error: &str) {
        warn!(
            event = "delivery_failed",
            instance = %self.instance,
            from = %from,
            to = %to,
            error = %error,
            "Message could not be delivered"
        );
    }

    pub fn log_model_loaded(&self, kind: &str, version: &str) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            kind = %kind,
            model_version = %version,
            "Regression model loaded"
        );
    }

    pub fn log_model_load_failed(&self, error: &str) {
        warn!(
            event = "model_load_failed",
            instance = %self.instance,
            error = %error,
            "Model unavailable, predictions disabled until restart"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "pipeline_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Vitals pipeline shutting down"
        );
    }
}

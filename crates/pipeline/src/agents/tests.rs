//! End-to-end tests of the wired pipeline

use super::*;
use crate::bus::AgentAddress;
use crate::health::ComponentStatus;
use crate::models::{sample_reading, Message, Reading};
use crate::observability::{drop_reasons, skip_reasons};
use crate::persistence::LoggedReading;
use crate::models::FeatureVector;
use crate::predictor::{LinearModel, ModelError, RegressionModel};
use std::future::Future;
use tempfile::TempDir;

fn telemetry() -> Telemetry {
    Telemetry::new(HealthRegistry::new(), StructuredLogger::new("agents-test"))
}

fn linear_loader() -> Arc<dyn ModelLoader> {
    Arc::new(|| -> Result<Arc<dyn RegressionModel>, ModelError> {
        let mut coefficients = [0.0; crate::models::FeatureVector::LEN];
        coefficients[0] = 0.01;
        Ok(Arc::new(LinearModel::new(-0.2, coefficients, "test-linear")))
    })
}

struct RejectingModel;

impl RegressionModel for RejectingModel {
    fn predict(&self, _features: &FeatureVector) -> Result<f64, ModelError> {
        Err(ModelError::Inference("shape mismatch".to_string()))
    }

    fn version(&self) -> &str {
        "rejecting"
    }

    fn kind(&self) -> &'static str {
        "test"
    }
}

fn rejecting_loader() -> Arc<dyn ModelLoader> {
    Arc::new(|| -> Result<Arc<dyn RegressionModel>, ModelError> { Ok(Arc::new(RejectingModel)) })
}

fn failing_loader() -> Arc<dyn ModelLoader> {
    Arc::new(|| -> Result<Arc<dyn RegressionModel>, ModelError> {
        Err(ModelError::Load("weights missing".to_string()))
    })
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn feed(runtime: &AgentRuntime, sequence: u64, reading: Reading) {
    runtime
        .bus()
        .send(
            &AgentAddress::new("test-feeder"),
            &AgentAddress::new(addresses::PREDICTOR),
            Message::reading(sequence, reading),
        )
        .unwrap();
}

#[tokio::test]
async fn test_generated_readings_are_scored_and_recorded() {
    let store = StateStore::new(100);
    let telemetry = telemetry();
    let health = telemetry.health.clone();

    let runtime = PipelineBuilder::new(store.clone(), linear_loader(), telemetry)
        .interval(Duration::from_millis(20))
        .seed(Some(1))
        .spawn()
        .unwrap();

    wait_until(|| {
        let store = store.clone();
        async move { store.snapshot().await.predictions.len() >= 3 }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.predictions.len(), snapshot.readings_len());
    for (i, prediction) in snapshot.predictions.iter().enumerate() {
        assert_eq!(prediction.index, i as u64);
        assert!((0.4..0.7).contains(&prediction.value));
    }
    assert_eq!(
        snapshot.latest_prediction,
        snapshot.predictions.last().copied()
    );
    assert_eq!(
        health.status_of(crate::health::components::PREDICTOR).await,
        Some(ComponentStatus::Healthy)
    );
}

#[tokio::test]
async fn test_failed_model_load_still_records_readings() {
    let store = StateStore::new(100);
    let telemetry = telemetry();
    let health = telemetry.health.clone();
    let metrics = telemetry.metrics.clone();
    let skipped_before = metrics.predictions_skipped(skip_reasons::MODEL_UNAVAILABLE);

    let runtime = PipelineBuilder::new(store.clone(), failing_loader(), telemetry)
        .without_generator()
        .spawn()
        .unwrap();

    wait_until(|| {
        let health = health.clone();
        async move {
            health.status_of(crate::health::components::PREDICTOR).await
                == Some(ComponentStatus::Degraded)
        }
    })
    .await;

    for sequence in 0..5 {
        feed(&runtime, sequence, sample_reading());
    }
    wait_until(|| {
        let store = store.clone();
        async move { store.readings_len().await == 5 }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    assert!(snapshot.predictions.is_empty());
    assert!(snapshot.latest_prediction.is_none());
    assert!(snapshot.metrics.values().all(|history| history.len() == 5));
    assert!(metrics.predictions_skipped(skip_reasons::MODEL_UNAVAILABLE) >= skipped_before + 5);
    assert_eq!(health.health().await.status, ComponentStatus::Degraded);
}

#[tokio::test]
async fn test_degraded_generator_keeps_filling_data() {
    let store = StateStore::new(100);

    let runtime = PipelineBuilder::new(store.clone(), failing_loader(), telemetry())
        .interval(Duration::from_millis(10))
        .seed(Some(3))
        .spawn()
        .unwrap();

    wait_until(|| {
        let store = store.clone();
        async move { store.readings_len().await >= 3 }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    assert!(snapshot.readings_len() >= 3);
    assert!(snapshot.predictions.is_empty());
    assert!(snapshot.plot_series().is_err());
}

#[tokio::test]
async fn test_model_error_records_reading_without_prediction() {
    let store = StateStore::new(100);
    let telemetry = telemetry();
    let metrics = telemetry.metrics.clone();
    let skipped_before = metrics.predictions_skipped(skip_reasons::MODEL_ERROR);

    let runtime = PipelineBuilder::new(store.clone(), rejecting_loader(), telemetry)
        .without_generator()
        .spawn()
        .unwrap();

    for sequence in 0..3 {
        feed(&runtime, sequence, sample_reading());
    }
    wait_until(|| {
        let store = store.clone();
        async move { store.readings_len().await == 3 }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    assert!(snapshot.predictions.is_empty());
    assert!(metrics.predictions_skipped(skip_reasons::MODEL_ERROR) >= skipped_before + 3);
}

#[tokio::test]
async fn test_malformed_blood_pressure_is_dropped() {
    let store = StateStore::new(100);
    let telemetry = telemetry();
    let metrics = telemetry.metrics.clone();
    let dropped_before = metrics.messages_dropped(drop_reasons::VALIDATION);

    let runtime = PipelineBuilder::new(store.clone(), linear_loader(), telemetry)
        .without_generator()
        .spawn()
        .unwrap();

    let malformed = |raw: &str| Reading {
        blood_pressure: raw.to_string(),
        ..sample_reading()
    };
    feed(&runtime, 0, malformed("120"));
    feed(&runtime, 1, malformed("120/80/70"));
    feed(&runtime, 2, sample_reading());

    wait_until(|| {
        let store = store.clone();
        async move { store.latest_prediction().await.is_some() }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.readings_len(), 1);
    assert_eq!(snapshot.predictions.len(), 1);
    assert_eq!(snapshot.predictions[0].index, 2);
    assert_eq!(
        snapshot.metrics["blood_pressure"],
        vec![crate::models::MetricValue::Text("120/80".to_string())]
    );
    assert!(metrics.messages_dropped(drop_reasons::VALIDATION) >= dropped_before + 2);
}

#[tokio::test]
async fn test_generator_resumes_sequence_from_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.json");
    {
        let mut log = ReadingsLog::open(&path, 100);
        for sequence in 0..5 {
            log.append(LoggedReading::now(sequence, sample_reading()))
                .unwrap();
        }
    }

    let store = StateStore::new(100);
    let runtime = PipelineBuilder::new(store.clone(), linear_loader(), telemetry())
        .interval(Duration::from_millis(20))
        .readings_log(&path)
        .spawn()
        .unwrap();

    wait_until(|| {
        let store = store.clone();
        async move { store.latest_prediction().await.is_some() }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.predictions[0].index, 5);
    assert!(snapshot.readings_len() > 5);

    let log = ReadingsLog::open(&path, 100);
    assert!(log.len() > 5);
    assert_eq!(log.entries()[5].sequence, 5);
}

#[tokio::test]
async fn test_logged_readings_restored_on_start() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readings.json");
    {
        let mut log = ReadingsLog::open(&path, 100);
        for sequence in 0..50 {
            let reading = Reading {
                heart_rate: 60 + sequence as u32,
                ..sample_reading()
            };
            log.append(LoggedReading::now(sequence, reading)).unwrap();
        }
    }

    let store = StateStore::new(100);
    let runtime = PipelineBuilder::new(store.clone(), failing_loader(), telemetry())
        .without_generator()
        .readings_log(&path)
        .spawn()
        .unwrap();

    wait_until(|| {
        let store = store.clone();
        async move { store.readings_len().await == 50 }
    })
    .await;
    runtime.shutdown().await;

    let snapshot = store.snapshot().await;
    let heart_rates = &snapshot.metrics["heart_rate"];
    assert_eq!(heart_rates[0], crate::models::MetricValue::Integer(60));
    assert_eq!(heart_rates[49], crate::models::MetricValue::Integer(109));
    assert!(snapshot.predictions.is_empty());
}

#[tokio::test]
async fn test_shutdown_removes_addresses() {
    let runtime = PipelineBuilder::new(StateStore::new(10), linear_loader(), telemetry())
        .spawn()
        .unwrap();
    let bus = runtime.bus().clone();

    for name in [addresses::GENERATOR, addresses::PREDICTOR, addresses::RECORDER] {
        assert!(bus.is_registered(&AgentAddress::new(name)));
    }

    runtime.shutdown().await;

    for name in [addresses::GENERATOR, addresses::PREDICTOR, addresses::RECORDER] {
        assert!(!bus.is_registered(&AgentAddress::new(name)));
    }
}

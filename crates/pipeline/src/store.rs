//! Shared state store
//!
//! Single owner of the cross-component state: one bounded history per metric,
//! the bounded prediction history and the latest prediction. Agents write to
//! it from their message handlers; HTTP handlers only take snapshots. Every
//! write is applied under one write lock, so a snapshot never sees a reading
//! in some metric histories but not others.

use crate::buffer::ReadingBuffer;
use crate::chart::ChartPoint;
use crate::models::{MetricValue, Prediction, Reading, METRIC_NAMES};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug)]
struct StoreState {
    metrics: BTreeMap<&'static str, ReadingBuffer<MetricValue>>,
    predictions: ReadingBuffer<Prediction>,
    latest_prediction: Option<Prediction>,
    readings_recorded: u64,
    predictions_recorded: u64,
}

impl StoreState {
    fn new(capacity: usize) -> Self {
        Self {
            metrics: METRIC_NAMES
                .iter()
                .map(|name| (*name, ReadingBuffer::new(capacity)))
                .collect(),
            predictions: ReadingBuffer::new(capacity),
            latest_prediction: None,
            readings_recorded: 0,
            predictions_recorded: 0,
        }
    }

    fn record_reading(&mut self, reading: &Reading) {
        for (name, value) in reading.metric_values() {
            if let Some(history) = self.metrics.get_mut(name) {
                history.push(value);
            }
        }
        self.readings_recorded += 1;
    }

    fn record_prediction(&mut self, prediction: Prediction) {
        self.predictions.push(prediction);
        self.latest_prediction = Some(prediction);
        self.predictions_recorded += 1;
    }

    fn readings_len(&self) -> usize {
        self.metrics.values().map(ReadingBuffer::len).min().unwrap_or(0)
    }
}

/// Cloneable handle to the process-wide store
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<RwLock<StoreState>>,
    capacity: usize,
}

impl StateStore {
    pub fn new(capacity: usize) -> Self {
        let state = StoreState::new(capacity);
        let capacity = state.predictions.capacity();
        Self {
            inner: Arc::new(RwLock::new(state)),
            capacity,
        }
    }

    /// Entries retained per history
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading to every metric history
    pub async fn record_reading(&self, reading: &Reading) {
        self.inner.write().await.record_reading(reading);
    }

    /// Append to the prediction history and replace the latest prediction
    pub async fn record_prediction(&self, prediction: Prediction) {
        self.inner.write().await.record_prediction(prediction);
    }

    /// Apply a reading and its prediction as one write
    pub async fn record(&self, reading: &Reading, prediction: Option<Prediction>) {
        let mut state = self.inner.write().await;
        state.record_reading(reading);
        if let Some(prediction) = prediction {
            state.record_prediction(prediction);
        }
    }

    pub async fn latest_prediction(&self) -> Option<Prediction> {
        self.inner.read().await.latest_prediction
    }

    /// Number of readings currently held per metric
    pub async fn readings_len(&self) -> usize {
        self.inner.read().await.readings_len()
    }

    /// Immutable copy of the whole store
    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.inner.read().await;
        StoreSnapshot {
            metrics: state
                .metrics
                .iter()
                .map(|(name, history)| (name.to_string(), history.snapshot()))
                .collect(),
            predictions: state.predictions.snapshot(),
            latest_prediction: state.latest_prediction,
            readings_recorded: state.readings_recorded,
            predictions_recorded: state.predictions_recorded,
        }
    }
}

/// Point-in-time copy of the store
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub metrics: BTreeMap<String, Vec<MetricValue>>,
    pub predictions: Vec<Prediction>,
    pub latest_prediction: Option<Prediction>,
    pub readings_recorded: u64,
    pub predictions_recorded: u64,
}

impl StoreSnapshot {
    /// Number of readings held per metric
    pub fn readings_len(&self) -> usize {
        self.metrics.values().map(Vec::len).min().unwrap_or(0)
    }

    /// Chart series pairing the first `min(readings, predictions)` entries
    pub fn plot_series(&self) -> Result<Vec<ChartPoint>, PlotError> {
        aligned_series(self.readings_len(), &self.predictions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlotError {
    #[error("no data or predictions available ({readings} readings, {predictions} predictions)")]
    NoData { readings: usize, predictions: usize },
}

/// Pair reading positions with predictions, clamping each score into `[0, 1]`
pub fn aligned_series(
    readings_len: usize,
    predictions: &[Prediction],
) -> Result<Vec<ChartPoint>, PlotError> {
    let count = readings_len.min(predictions.len());
    if count == 0 {
        return Err(PlotError::NoData {
            readings: readings_len,
            predictions: predictions.len(),
        });
    }

    Ok(predictions[..count]
        .iter()
        .enumerate()
        .map(|(i, prediction)| ChartPoint {
            x: i as f64,
            y: prediction.clamped(),
        })
        .collect())
}

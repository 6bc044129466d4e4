//! Core data models for the vitals pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metric names in the order they appear on a [`Reading`]
pub const METRIC_NAMES: [&str; 7] = [
    "heart_rate",
    "blood_pressure",
    "temperature",
    "moisture",
    "body_water_content",
    "fatigue_level",
    "drowsiness_level",
];

/// A single synthetic physiological reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub heart_rate: u32,
    /// Formatted as `"<systolic>/<diastolic>"`
    pub blood_pressure: String,
    pub temperature: f64,
    pub moisture: f64,
    pub body_water_content: u32,
    pub fatigue_level: u32,
    pub drowsiness_level: u32,
}

impl Reading {
    /// Parse the blood pressure field into `(systolic, diastolic)`
    pub fn blood_pressure(&self) -> Result<BloodPressure, ValidationError> {
        BloodPressure::parse(&self.blood_pressure)
    }

    /// Per-metric values, paired with their names from [`METRIC_NAMES`]
    pub fn metric_values(&self) -> [(&'static str, MetricValue); 7] {
        [
            (METRIC_NAMES[0], MetricValue::Integer(self.heart_rate as i64)),
            (METRIC_NAMES[1], MetricValue::Text(self.blood_pressure.clone())),
            (METRIC_NAMES[2], MetricValue::Float(self.temperature)),
            (METRIC_NAMES[3], MetricValue::Float(self.moisture)),
            (METRIC_NAMES[4], MetricValue::Integer(self.body_water_content as i64)),
            (METRIC_NAMES[5], MetricValue::Integer(self.fatigue_level as i64)),
            (METRIC_NAMES[6], MetricValue::Integer(self.drowsiness_level as i64)),
        ]
    }
}

/// A value held in a per-metric history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Parsed blood pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloodPressure {
    pub systolic: i32,
    pub diastolic: i32,
}

impl BloodPressure {
    /// Parse `"<systolic>/<diastolic>"`. Anything other than exactly two
    /// integer parts is rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut parts = raw.split('/');
        let (Some(systolic), Some(diastolic), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ValidationError::BloodPressureShape(raw.to_string()));
        };

        let parse_part = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| ValidationError::BloodPressureValue(raw.to_string()))
        };

        Ok(Self {
            systolic: parse_part(systolic)?,
            diastolic: parse_part(diastolic)?,
        })
    }
}

/// Rejection of a reading before feature extraction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("blood pressure {0:?} does not split into systolic/diastolic")]
    BloodPressureShape(String),
    #[error("blood pressure {0:?} has a non-integer part")]
    BloodPressureValue(String),
}

/// A model score for one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Sequence number of the reading this score was computed from
    pub index: u64,
    pub value: f64,
}

impl Prediction {
    /// The score clamped into `[0, 1]` for display
    pub fn clamped(&self) -> f64 {
        self.value.clamp(0.0, 1.0)
    }
}

/// Kind of a pipeline message, used to dispatch on-message handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A raw reading, not yet scored
    Reading,
    /// A reading carrying its prediction
    Enriched,
}

/// Envelope exchanged between agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sequence: u64,
    pub reading: Reading,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
}

impl Message {
    pub fn reading(sequence: u64, reading: Reading) -> Self {
        Self {
            sequence,
            reading,
            prediction: None,
        }
    }

    /// Attach a prediction, turning this into an enriched message
    pub fn with_prediction(mut self, prediction: Prediction) -> Self {
        self.prediction = Some(prediction);
        self
    }

    pub fn kind(&self) -> MessageKind {
        match self.prediction {
            Some(_) => MessageKind::Enriched,
            None => MessageKind::Reading,
        }
    }
}

/// Feature vector for the regression model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub heart_rate: f32,
    pub systolic: f32,
    pub diastolic: f32,
    pub temperature: f32,
    pub moisture: f32,
    pub body_water_content: f32,
    pub fatigue_level: f32,
    pub drowsiness_level: f32,
}

impl FeatureVector {
    /// Number of model inputs
    pub const LEN: usize = 8;

    /// Column names in model input order
    pub const NAMES: [&'static str; Self::LEN] = [
        "heart_rate",
        "systolic",
        "diastolic",
        "temperature",
        "moisture",
        "body_water_content",
        "fatigue_level",
        "drowsiness_level",
    ];

    /// Values in model input order
    pub fn to_array(&self) -> [f32; Self::LEN] {
        [
            self.heart_rate,
            self.systolic,
            self.diastolic,
            self.temperature,
            self.moisture,
            self.body_water_content,
            self.fatigue_level,
            self.drowsiness_level,
        ]
    }
}

#[cfg(test)]
pub(crate) fn sample_reading() -> Reading {
    Reading {
        heart_rate: 72,
        blood_pressure: "120/80".to_string(),
        temperature: 36.8,
        moisture: 0.5,
        body_water_content: 55,
        fatigue_level: 2,
        drowsiness_level: 1,
    }
}

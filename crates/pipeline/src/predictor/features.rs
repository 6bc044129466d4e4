//! Feature extraction for model inference

use crate::models::{FeatureVector, Reading, ValidationError};

/// Build the model input for a reading.
///
/// Fails when the blood pressure cannot be split into systolic/diastolic;
/// such readings must never reach the model.
pub fn extract_features(reading: &Reading) -> Result<FeatureVector, ValidationError> {
    let bp = reading.blood_pressure()?;

    Ok(FeatureVector {
        heart_rate: reading.heart_rate as f32,
        systolic: bp.systolic as f32,
        diastolic: bp.diastolic as f32,
        temperature: reading.temperature as f32,
        moisture: reading.moisture as f32,
        body_water_content: reading.body_water_content as f32,
        fatigue_level: reading.fatigue_level as f32,
        drowsiness_level: reading.drowsiness_level as f32,
    })
}

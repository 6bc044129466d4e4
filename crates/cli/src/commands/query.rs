//! Data, prediction and plot commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, MetricHistories, PredictionResponse};
use crate::output::{
    color_score, format_value, print_json, print_rows, print_success, print_warning, OutputFormat,
};

/// One buffered reading, assembled from the per-metric histories
#[derive(Debug, Tabled)]
pub struct ReadingRow {
    #[tabled(rename = "#")]
    pub position: usize,
    #[tabled(rename = "Heart rate")]
    pub heart_rate: String,
    #[tabled(rename = "Blood pressure")]
    pub blood_pressure: String,
    #[tabled(rename = "Temp (°C)")]
    pub temperature: String,
    #[tabled(rename = "Moisture")]
    pub moisture: String,
    #[tabled(rename = "Body water")]
    pub body_water_content: String,
    #[tabled(rename = "Fatigue")]
    pub fatigue_level: String,
    #[tabled(rename = "Drowsiness")]
    pub drowsiness_level: String,
}

/// Zip the histories into rows; `last` keeps only the newest entries
pub fn reading_rows(histories: &MetricHistories, last: Option<usize>) -> Vec<ReadingRow> {
    let len = histories.values().map(Vec::len).max().unwrap_or(0);
    let start = last.map_or(0, |n| len.saturating_sub(n));
    let cell = |metric: &str, i: usize| format_value(histories.get(metric).and_then(|h| h.get(i)));

    (start..len)
        .map(|i| ReadingRow {
            position: i,
            heart_rate: cell("heart_rate", i),
            blood_pressure: cell("blood_pressure", i),
            temperature: cell("temperature", i),
            moisture: cell("moisture", i),
            body_water_content: cell("body_water_content", i),
            fatigue_level: cell("fatigue_level", i),
            drowsiness_level: cell("drowsiness_level", i),
        })
        .collect()
}

pub async fn show_data(client: &ApiClient, last: Option<usize>, format: OutputFormat) -> Result<()> {
    let histories: MetricHistories = client.get("data").await?;
    let rows = reading_rows(&histories, last);
    print_rows(&rows, &histories, format);

    if matches!(format, OutputFormat::Table) && !rows.is_empty() {
        let total = histories.values().map(Vec::len).max().unwrap_or(0);
        println!("\nShowing {} of {} buffered readings", rows.len(), total);
    }
    Ok(())
}

pub async fn show_prediction(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: PredictionResponse = client.get("prediction").await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => match (response.prediction, response.index) {
            (Some(score), index) => {
                println!("{}", "Latest Efficiency Prediction".bold());
                println!("{}", "=".repeat(40));
                println!("Score:    {} (raw {:.4})", color_score(score), score);
                if let Some(index) = index {
                    println!("Reading:  #{}", index);
                }
            }
            (None, _) => print_warning(
                response
                    .message
                    .as_deref()
                    .unwrap_or("No prediction available yet."),
            ),
        },
    }
    Ok(())
}

pub async fn save_plot(client: &ApiClient, output: &Path) -> Result<()> {
    let image = client.get_bytes("plot").await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    std::fs::write(output, &image).with_context(|| format!("Failed to write {:?}", output))?;

    print_success(&format!(
        "Saved trend chart to {} ({} bytes)",
        output.display(),
        image.len()
    ));
    Ok(())
}

//! Result sinks: hourly and daily CSV files, a JSON payload file, and the
//! HTTP upload of that payload.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Serialize;
use tracing::info;

use crate::errors::{AppError, PipelineError};
use crate::models::report::{AnomalyOverlay, DailySummary, OutputRecord, UploadPayload};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct HourlyRow<'a> {
    utc_timestamp: &'a str,
    solar_ws: Option<f64>,
    solar_bom: f64,
    anomaly: Option<f64>,
}

/// Hourly comparison table; the `anomaly` column is blank except at flagged hours.
pub fn write_hourly_csv(path: &Path, records: &[OutputRecord], overlay: &AnomalyOverlay) -> Result<(), AppError> {
    if overlay.len() != records.len() {
        return Err(PipelineError::ShapeMismatch {
            what: "anomaly overlay vs records",
            expected: records.len(),
            actual: overlay.len(),
        }
        .into());
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| AppError::csv(path, e))?;
    for (i, r) in records.iter().enumerate() {
        writer
            .serialize(HourlyRow {
                utc_timestamp: &r.utc_timestamp,
                solar_ws: r.solar_ws,
                solar_bom: r.solar_bom,
                anomaly: overlay.get(i),
            })
            .map_err(|e| AppError::csv(path, e))?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    info!(file = %path.display(), rows = records.len(), "hourly CSV written");
    Ok(())
}

pub fn write_daily_csv(path: &Path, days: &[DailySummary]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| AppError::csv(path, e))?;
    for day in days {
        writer.serialize(day).map_err(|e| AppError::csv(path, e))?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    info!(file = %path.display(), rows = days.len(), "daily CSV written");
    Ok(())
}

pub fn write_json(path: &Path, payload: &UploadPayload) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, payload)?;
    writer.flush().map_err(|e| AppError::io(path, e))?;
    info!(file = %path.display(), records = payload.records.len(), "JSON payload written");
    Ok(())
}

/// POSTs the payload as JSON and returns the response body.
pub async fn upload(endpoint: &str, payload: &UploadPayload) -> Result<String, AppError> {
    let client = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
    post_payload(&client, endpoint, payload).await
}

async fn post_payload(client: &Client, endpoint: &str, payload: &UploadPayload) -> Result<String, AppError> {
    let response = client
        .post(endpoint)
        .header(ACCEPT, "text/plain")
        .json(payload)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AppError::Upload(format!("{} returned {}: {}", endpoint, status, body)));
    }

    info!(endpoint, %status, run_id = %payload.run_id, "payload uploaded");
    Ok(body)
}

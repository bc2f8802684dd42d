use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::series::TimePoint;

// ─── Anomaly overlay ─────────────────────────────────────────────────────────

/// Reporting-only marker series aligned with the hourly grid.
///
/// `Some(v)` carries the normalized value at an anomalous hour; `None` means
/// "no anomaly". A zero irradiance is a legitimate `Some(0.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyOverlay {
    points: Vec<Option<f64>>,
}

impl AnomalyOverlay {
    pub fn new(points: Vec<Option<f64>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.points.get(index).copied().flatten()
    }

    /// `(index, carried value)` of every anomalous hour.
    pub fn anomalies(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|v| (i, v)))
    }

    pub fn count(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }
}

// ─── Output records ──────────────────────────────────────────────────────────

/// One hourly record handed to the file and HTTP sinks.
///
/// Field names and the timestamp format are the external contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// RFC 3339 instant in UTC, e.g. `2019-05-31T14:00:00+00:00`
    pub utc_timestamp: String,
    /// Measured irradiance (W/m²); `null` when the sensor hour is missing
    pub solar_ws: Option<f64>,
    /// Normalized modeled irradiance (W/m²)
    pub solar_bom: f64,
}

impl OutputRecord {
    pub fn new(t: &TimePoint, measured: Option<f64>, modeled: f64) -> Self {
        Self {
            utc_timestamp: utc_timestamp(t),
            solar_ws: measured,
            solar_bom: modeled,
        }
    }
}

pub fn utc_timestamp(t: &TimePoint) -> String {
    t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    pub candidate: String,
    pub version: String,
    pub run_id: Uuid,
    pub records: Vec<OutputRecord>,
}

impl UploadPayload {
    pub fn new(candidate: &str, version: &str, records: Vec<OutputRecord>) -> Self {
        Self {
            candidate: candidate.to_string(),
            version: version.to_string(),
            run_id: Uuid::new_v4(),
            records,
        }
    }
}

// ─── Daily comparison ────────────────────────────────────────────────────────

/// Daily energy from every source for one local day, MJ/m².
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub ground_truth_mj: f64,
    pub modeled_mj: f64,
    /// Energy of the present sensor hours only
    pub sensor_mj: f64,
    pub missing_sensor_hours: usize,
    pub factor: f64,
}

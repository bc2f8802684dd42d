use std::path::PathBuf;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::anomaly::ANOMALY_THRESHOLD;

fn default_threshold() -> f64 { ANOMALY_THRESHOLD }
fn default_window_hours() -> usize { 6 }
fn default_time_column() -> String { "Time".to_string() }
fn default_value_column() -> String { "Solar Radiation".to_string() }
fn default_time_format() -> String { "%d/%m/%Y %H:%M:%S".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub window: WindowConfig,
    pub sensor: SensorConfig,
    pub ground_truth: GroundTruthConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA zone name, e.g. "Australia/Brisbane"
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    pub start_date: NaiveDate,
    pub days: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    pub csv_path: PathBuf,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroundTruthConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnomalyConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_window_hours")]
    pub window_hours: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_hours: default_window_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub csv_file: PathBuf,
    pub daily_csv_file: Option<PathBuf>,
    pub json_file: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub candidate: String,
    pub version: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(-90.0..=90.0).contains(&self.site.latitude) {
            return Err(AppError::Config(format!("latitude {} out of range", self.site.latitude)));
        }
        if !(-180.0..=180.0).contains(&self.site.longitude) {
            return Err(AppError::Config(format!("longitude {} out of range", self.site.longitude)));
        }
        if self.window.days == 0 {
            return Err(AppError::Config("window.days must be at least 1".to_string()));
        }
        if !self.anomaly.threshold.is_finite() {
            return Err(AppError::Config("anomaly.threshold must be finite".to_string()));
        }
        self.timezone().map(|_| ())
    }

    pub fn timezone(&self) -> Result<Tz, AppError> {
        self.site
            .timezone
            .parse::<Tz>()
            .map_err(|_| AppError::Timezone(self.site.timezone.clone()))
    }
}

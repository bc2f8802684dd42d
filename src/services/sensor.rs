//! Weather-station readings resampled onto the hourly grid.
//!
//! Gaps stay gaps: an empty or non-numeric cell is a missing sample, and an
//! hour without any present sample is `None` rather than zero irradiance.

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::series::{HourlySeries, TimePoint};

const SECONDS_PER_HOUR: i64 = 3600;

pub trait SensorSource {
    /// Measured irradiance (W/m²) for every instant of `window`.
    fn hourly(&self, window: &[TimePoint]) -> Result<HourlySeries<Option<f64>>, AppError>;
}

/// Sub-hourly station export with a local timestamp column and an
/// irradiance column.
#[derive(Debug, Clone)]
pub struct CsvSensorSource {
    pub path: PathBuf,
    pub time_column: String,
    pub value_column: String,
    /// chrono format of the timestamp column, e.g. `%d/%m/%Y %H:%M:%S`
    pub time_format: String,
    /// Zone the naive timestamps are expressed in
    pub tz: Tz,
}

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    sum: f64,
    count: usize,
}

impl CsvSensorSource {
    fn column(&self, headers: &csv::StringRecord, name: &str) -> Result<usize, AppError> {
        headers.iter().position(|h| h == name).ok_or_else(|| AppError::Row {
            path: self.path.clone(),
            line: 1,
            message: format!("missing column '{}'", name),
        })
    }
}

impl SensorSource for CsvSensorSource {
    fn hourly(&self, window: &[TimePoint]) -> Result<HourlySeries<Option<f64>>, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| AppError::csv(&self.path, e))?;

        let headers = reader.headers().map_err(|e| AppError::csv(&self.path, e))?.clone();
        let time_idx = self.column(&headers, &self.time_column)?;
        let value_idx = self.column(&headers, &self.value_column)?;

        let Some(start) = window.first() else {
            return Ok(HourlySeries::new(Vec::new(), Vec::new())?);
        };
        let span_s = window.len() as i64 * SECONDS_PER_HOUR;

        let mut buckets = vec![Bucket::default(); window.len()];
        let (mut rows, mut outside, mut missing_cells) = (0usize, 0usize, 0usize);

        for record in reader.records() {
            let record = record.map_err(|e| AppError::csv(&self.path, e))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            rows += 1;

            let raw_time = record.get(time_idx).unwrap_or_default();
            let naive = NaiveDateTime::parse_from_str(raw_time, &self.time_format).map_err(|e| AppError::Row {
                path: self.path.clone(),
                line,
                message: format!("bad timestamp '{}': {}", raw_time, e),
            })?;
            let Some(t) = self.tz.from_local_datetime(&naive).earliest() else {
                return Err(AppError::Row {
                    path: self.path.clone(),
                    line,
                    message: format!("'{}' does not exist in {}", raw_time, self.tz),
                });
            };

            let offset_s = t.signed_duration_since(*start).num_seconds();
            if offset_s < 0 || offset_s >= span_s {
                outside += 1;
                continue;
            }

            match parse_reading(record.get(value_idx).unwrap_or_default()) {
                Some(v) => {
                    let bucket = &mut buckets[(offset_s / SECONDS_PER_HOUR) as usize];
                    bucket.sum += v;
                    bucket.count += 1;
                }
                None => missing_cells += 1,
            }
        }

        let values: Vec<Option<f64>> = buckets
            .iter()
            .map(|b| (b.count > 0).then(|| b.sum / b.count as f64))
            .collect();
        let missing_hours = values.iter().filter(|v| v.is_none()).count();

        debug!(rows, outside, missing_cells, "sensor rows scanned");
        info!(
            file = %self.path.display(),
            hours = values.len(),
            missing_hours,
            "sensor series resampled"
        );

        Ok(HourlySeries::new(window.to_vec(), values)?)
    }
}

/// A present, finite reading; anything else is missing.
fn parse_reading(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::series::hourly_window;
    use chrono::NaiveDate;
    use chrono_tz::Australia::Brisbane;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn source(path: PathBuf) -> CsvSensorSource {
        CsvSensorSource {
            path,
            time_column: "Time".to_string(),
            value_column: "Solar Radiation".to_string(),
            time_format: "%d/%m/%Y %H:%M:%S".to_string(),
            tz: Brisbane,
        }
    }

    fn window() -> Vec<TimePoint> {
        hourly_window(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(), 1, Brisbane).unwrap()
    }

    #[test]
    fn test_five_minute_rows_are_averaged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ws.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "Time,Temperature,Solar Radiation").unwrap();
        // Day before the window
        writeln!(f, "31/05/2019 23:55:00,12.0,0").unwrap();
        for m in (0..60).step_by(5) {
            writeln!(f, "01/06/2019 10:{m:02}:00,18.0,{}", 400 + m).unwrap();
        }
        writeln!(f, "01/06/2019 11:00:00,18.5,").unwrap();
        writeln!(f, "01/06/2019 11:05:00,18.5,nan").unwrap();
        writeln!(f, "01/06/2019 12:00:00,19.0,600").unwrap();
        writeln!(f, "01/06/2019 12:05:00,19.0,n/a").unwrap();
        drop(f);

        let series = source(path).hourly(&window()).unwrap();
        let v = series.values();
        assert_eq!(v.len(), 24);
        // mean of 400, 405, …, 455
        assert_eq!(v[10], Some(427.5));
        assert_eq!(v[11], None, "hour with only blank cells is missing, not zero");
        assert_eq!(v[12], Some(600.0));
        assert_eq!(v[0], None);
    }

    #[test]
    fn test_measured_zero_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ws.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "Time,Solar Radiation").unwrap();
        writeln!(f, "01/06/2019 02:00:00,0").unwrap();
        drop(f);

        let series = source(path).hourly(&window()).unwrap();
        assert_eq!(series.values()[2], Some(0.0));
    }

    #[test]
    fn test_bad_timestamp_names_the_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ws.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "Time,Solar Radiation").unwrap();
        writeln!(f, "01/06/2019 02:00:00,10").unwrap();
        writeln!(f, "2019-06-01 02:05,12").unwrap();
        drop(f);

        let err = source(path).hourly(&window()).unwrap_err();
        assert!(matches!(err, AppError::Row { line: 3, .. }), "got {err}");
    }

    #[test]
    fn test_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ws.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "Time,Irradiance").unwrap();
        drop(f);

        let err = source(path).hourly(&window()).unwrap_err();
        assert!(matches!(err, AppError::Row { line: 1, .. }), "got {err}");
    }
}

//! Daily ground-truth totals.
//!
//! A [`GridDataSource`] turns one file into one daily total for the site;
//! [`collect_daily_totals`] assembles a directory of such files into the
//! per-day vector the normalizer consumes.
//!
//! The shipped [`PointExtractSource`] reads point extracts, small CSV files
//! already cut out of the gridded product:
//!
//! ```text
//! latitude,longitude,value,start_date,end_date
//! -27.5,153.0,14.2,2019-06-01,2019-06-01
//! -27.5,153.05,14.3,2019-06-01,2019-06-01
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{AppError, PipelineError};

/// Maximum coordinate difference, degrees, for a row to match the site.
const COORD_TOLERANCE_DEG: f64 = 1e-6;

/// One daily total and the date range it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct GridReading {
    /// Integrated daily energy, MJ/m²
    pub value_mj_m2: f64,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

pub trait GridDataSource {
    /// Whether `path` looks like a file this source can read. Other files in
    /// the ground-truth directory are skipped.
    fn accepts(&self, _path: &Path) -> bool {
        true
    }

    fn daily_total(&self, grid_file: &Path, lat: f64, lon: f64) -> Result<GridReading, AppError>;
}

// ─── Point extracts ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExtractRow {
    latitude: f64,
    longitude: f64,
    value: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PointExtractSource;

impl GridDataSource for PointExtractSource {
    fn accepts(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }

    fn daily_total(&self, grid_file: &Path, lat: f64, lon: f64) -> Result<GridReading, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(grid_file)
            .map_err(|e| AppError::csv(grid_file, e))?;

        for row in reader.deserialize::<ExtractRow>() {
            let row = row.map_err(|e| AppError::csv(grid_file, e))?;
            if (row.latitude - lat).abs() <= COORD_TOLERANCE_DEG && (row.longitude - lon).abs() <= COORD_TOLERANCE_DEG {
                return Ok(GridReading {
                    value_mj_m2: row.value,
                    window_start: row.start_date,
                    window_end: row.end_date,
                });
            }
        }

        Err(AppError::GroundTruth(format!(
            "{} has no value for ({}, {})",
            grid_file.display(),
            lat,
            lon
        )))
    }
}

// ─── Window assembly ─────────────────────────────────────────

/// Reads every file in `dir` the source accepts and returns one total per
/// entry of `day_dates`.
///
/// Files are matched to days by the start of the range they cover, not by
/// name or listing order. Files covering dates outside the window are
/// ignored; two files for the same day are an error.
pub fn collect_daily_totals<S: GridDataSource + ?Sized>(
    source: &S,
    dir: &Path,
    lat: f64,
    lon: f64,
    day_dates: &[NaiveDate],
) -> Result<Vec<f64>, AppError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| AppError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut slots: Vec<Option<(f64, PathBuf)>> = vec![None; day_dates.len()];
    for path in files {
        if !source.accepts(&path) {
            debug!(file = %path.display(), "not a ground-truth file, skipped");
            continue;
        }
        let reading = source.daily_total(&path, lat, lon)?;
        debug!(file = %path.display(), date = %reading.window_start, value_mj = reading.value_mj_m2, "ground truth read");

        if reading.window_end != reading.window_start {
            warn!(
                file = %path.display(),
                start = %reading.window_start,
                end = %reading.window_end,
                "multi-day reading, assigned to its start date"
            );
        }

        let Ok(day) = day_dates.binary_search(&reading.window_start) else {
            debug!(file = %path.display(), date = %reading.window_start, "outside analysis window, skipped");
            continue;
        };

        if let Some((_, earlier)) = &slots[day] {
            return Err(AppError::GroundTruth(format!(
                "{} and {} both cover {}",
                earlier.display(),
                path.display(),
                reading.window_start
            )));
        }
        slots[day] = Some((reading.value_mj_m2, path));
    }

    let supplied = slots.iter().filter(|s| s.is_some()).count();
    if supplied < day_dates.len() {
        for (date, _) in day_dates.iter().zip(&slots).filter(|(_, s)| s.is_none()) {
            warn!(%date, "no ground-truth file for day");
        }
        return Err(PipelineError::MissingWindowData {
            expected: day_dates.len(),
            supplied,
        }
        .into());
    }

    Ok(slots.into_iter().flatten().map(|(value, _)| value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const LAT: f64 = -27.5;
    const LON: f64 = 153.0;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 6, d).unwrap()
    }

    fn write_extract(dir: &Path, name: &str, day: u32, value: f64) {
        let mut f = File::create(dir.join(name)).unwrap();
        writeln!(f, "latitude,longitude,value,start_date,end_date").unwrap();
        writeln!(f, "-27.45,153.0,99.0,2019-06-{day:02},2019-06-{day:02}").unwrap();
        writeln!(f, "{LAT},{LON},{value},2019-06-{day:02},2019-06-{day:02}").unwrap();
    }

    #[test]
    fn test_point_lookup() {
        let dir = tempdir().unwrap();
        write_extract(dir.path(), "a.csv", 1, 14.2);
        let reading = PointExtractSource.daily_total(&dir.path().join("a.csv"), LAT, LON).unwrap();
        assert_eq!(reading.value_mj_m2, 14.2);
        assert_eq!(reading.window_start, date(1));
    }

    #[test]
    fn test_point_lookup_miss() {
        let dir = tempdir().unwrap();
        write_extract(dir.path(), "a.csv", 1, 14.2);
        let err = PointExtractSource.daily_total(&dir.path().join("a.csv"), -30.0, LON).unwrap_err();
        assert!(matches!(err, AppError::GroundTruth(_)), "got {err}");
    }

    #[test]
    fn test_files_are_placed_by_date() {
        let dir = tempdir().unwrap();
        // Names sort opposite to dates
        write_extract(dir.path(), "a.csv", 3, 12.0);
        write_extract(dir.path(), "b.csv", 2, 11.0);
        write_extract(dir.path(), "c.csv", 1, 10.0);
        write_extract(dir.path(), "d.csv", 9, 99.0);

        let totals = collect_daily_totals(&PointExtractSource, dir.path(), LAT, LON, &[date(1), date(2), date(3)]).unwrap();
        assert_eq!(totals, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_stray_files_are_skipped() {
        let dir = tempdir().unwrap();
        write_extract(dir.path(), "a.csv", 1, 10.0);
        write_extract(dir.path(), "b.CSV", 2, 11.0);
        std::fs::write(dir.path().join("README"), "daily totals, June 2019\n").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), [0u8, 1, 2, 3]).unwrap();

        let totals = collect_daily_totals(&PointExtractSource, dir.path(), LAT, LON, &[date(1), date(2)]).unwrap();
        assert_eq!(totals, vec![10.0, 11.0]);
    }

    #[test]
    fn test_missing_day_is_reported() {
        let dir = tempdir().unwrap();
        write_extract(dir.path(), "a.csv", 1, 10.0);
        write_extract(dir.path(), "c.csv", 3, 12.0);

        let err = collect_daily_totals(&PointExtractSource, dir.path(), LAT, LON, &[date(1), date(2), date(3)]).unwrap_err();
        assert!(
            matches!(err, AppError::Pipeline(PipelineError::MissingWindowData { expected: 3, supplied: 2 })),
            "got {err}"
        );
    }

    #[test]
    fn test_duplicate_day_is_rejected() {
        let dir = tempdir().unwrap();
        write_extract(dir.path(), "a.csv", 1, 10.0);
        write_extract(dir.path(), "b.csv", 1, 10.5);

        let err = collect_daily_totals(&PointExtractSource, dir.path(), LAT, LON, &[date(1)]).unwrap_err();
        assert!(matches!(err, AppError::GroundTruth(_)), "got {err}");
    }
}

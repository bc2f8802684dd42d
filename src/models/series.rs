use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::errors::PipelineError;

/// An instant carrying its analysis time zone.
pub type TimePoint = DateTime<Tz>;

pub const HOURS_PER_DAY: usize = 24;

// ─── Window construction ─────────────────────────────────────────────────────

/// Builds the contiguous hourly grid for `days` local days starting at
/// midnight of `start`.
///
/// The grid is plain UTC arithmetic from the first local midnight, so a window
/// that crosses a DST change is rejected later by [`HourlySeries::new`].
pub fn hourly_window(start: NaiveDate, days: usize, tz: Tz) -> Result<Vec<TimePoint>, PipelineError> {
    let midnight = start.and_time(NaiveTime::MIN);
    let first = tz
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or(PipelineError::NoLocalMidnight { date: start })?;

    Ok((0..days * HOURS_PER_DAY)
        .map(|h| first + TimeDelta::hours(h as i64))
        .collect())
}

// ─── Hourly series ───────────────────────────────────────────────────────────

/// Chronological hourly samples covering whole local days.
///
/// The timestamp order is the series' identity: construction validates it once
/// and no operation reorders samples afterwards. `T` is `f64` for modeled
/// curves and `Option<f64>` for sensor data, where `None` marks a missing hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries<T = f64> {
    timestamps: Vec<TimePoint>,
    values: Vec<T>,
}

impl<T> HourlySeries<T> {
    pub fn new(timestamps: Vec<TimePoint>, values: Vec<T>) -> Result<Self, PipelineError> {
        if values.len() != timestamps.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "series values vs timestamps",
                expected: timestamps.len(),
                actual: values.len(),
            });
        }
        if timestamps.is_empty() || timestamps.len() % HOURS_PER_DAY != 0 {
            return Err(PipelineError::ShapeMismatch {
                what: "whole days of hourly samples",
                expected: timestamps.len().div_ceil(HOURS_PER_DAY).max(1) * HOURS_PER_DAY,
                actual: timestamps.len(),
            });
        }

        for (index, pair) in timestamps.windows(2).enumerate() {
            if pair[1].signed_duration_since(pair[0]) != TimeDelta::hours(1) {
                return Err(PipelineError::InvalidTimestampOrder {
                    index: index + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        for index in (0..timestamps.len()).step_by(HOURS_PER_DAY) {
            let t = timestamps[index];
            if t.hour() != 0 || t.minute() != 0 || t.second() != 0 {
                return Err(PipelineError::MisalignedDay { index, timestamp: t });
            }
        }

        Ok(Self { timestamps, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn day_count(&self) -> usize {
        self.values.len() / HOURS_PER_DAY
    }

    pub fn timestamps(&self) -> &[TimePoint] {
        &self.timestamps
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Local calendar date of each day in the window.
    pub fn day_dates(&self) -> Vec<NaiveDate> {
        self.timestamps
            .iter()
            .step_by(HOURS_PER_DAY)
            .map(|t| t.date_naive())
            .collect()
    }

    /// Iterates `(date, samples)` for each local day, in order.
    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, &[T])> + '_ {
        self.timestamps
            .iter()
            .step_by(HOURS_PER_DAY)
            .zip(self.values.chunks(HOURS_PER_DAY))
            .map(|(t, chunk)| (t.date_naive(), chunk))
    }

    /// A new series on the same grid. The grid is already validated, so only
    /// the length is checked.
    pub fn with_values<U>(&self, values: Vec<U>) -> Result<HourlySeries<U>, PipelineError> {
        if values.len() != self.timestamps.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "replacement values",
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }
        Ok(HourlySeries {
            timestamps: self.timestamps.clone(),
            values,
        })
    }

    /// Fails with `ShapeMismatch` unless `other` has as many samples as `self`.
    pub fn ensure_aligned<U>(&self, other: &HourlySeries<U>, what: &'static str) -> Result<(), PipelineError> {
        if other.len() != self.len() {
            return Err(PipelineError::ShapeMismatch {
                what,
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }
}

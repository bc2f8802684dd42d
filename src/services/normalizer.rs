//! Daily normalization of a modeled irradiance curve against ground truth.
//!
//! Each local day is rescaled independently so that its integrated energy
//! equals the externally measured daily total for that day.

use chrono::NaiveDate;
use tracing::debug;

use crate::errors::PipelineError;
use crate::models::series::{HourlySeries, HOURS_PER_DAY};

/// Integration step of one hourly sample, seconds.
pub const SECONDS_PER_SAMPLE: f64 = 3600.0;

const JOULES_PER_MJ: f64 = 1_000_000.0;

/// Energy (MJ/m²) delivered by a constant power (W/m²) held for one sample.
#[inline]
pub fn hourly_energy_mj(power_w_m2: f64) -> f64 {
    power_w_m2 * SECONDS_PER_SAMPLE / JOULES_PER_MJ
}

/// Integrated energy (MJ/m²) of one day of hourly power samples.
pub fn daily_energy_mj(day: &[f64]) -> f64 {
    day.iter().map(|p| hourly_energy_mj(*p)).sum()
}

/// A normalized series together with the per-day factors that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub series: HourlySeries,
    /// `modeled_energy[d] / daily_total[d]`
    pub factors: Vec<f64>,
    /// Energy of the raw model per day, MJ/m²
    pub modeled_energy: Vec<f64>,
}

/// Rescales `raw` so every day integrates to the matching entry of
/// `daily_totals` (MJ/m²).
///
/// All days are validated before any output is produced; the first offending
/// day is reported.
pub fn normalize(raw: &HourlySeries, daily_totals: &[f64]) -> Result<Normalization, PipelineError> {
    let days = raw.day_count();
    if daily_totals.len() < days {
        return Err(PipelineError::MissingWindowData {
            expected: days,
            supplied: daily_totals.len(),
        });
    }
    if daily_totals.len() > days {
        return Err(PipelineError::ShapeMismatch {
            what: "daily totals vs window days",
            expected: days,
            actual: daily_totals.len(),
        });
    }

    if let Some((index, &value)) = raw
        .values()
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        return Err(PipelineError::InvalidModeledSample {
            day: index / HOURS_PER_DAY,
            index,
            timestamp: raw.timestamps()[index],
            value,
        });
    }

    let mut factors = Vec::with_capacity(days);
    let mut modeled_energy = Vec::with_capacity(days);
    for (day, ((date, samples), &total)) in raw.days().zip(daily_totals).enumerate() {
        let modeled = daily_energy_mj(samples);
        factors.push(day_factor(day, date, modeled, total)?);
        modeled_energy.push(modeled);
        debug!(day, %date, modeled_mj = modeled, total_mj = total, factor = factors[day], "daily factor");
    }

    let values: Vec<f64> = raw
        .days()
        .zip(&factors)
        .flat_map(|((_, samples), factor)| samples.iter().map(move |p| p / factor))
        .collect();

    Ok(Normalization {
        series: raw.with_values(values)?,
        factors,
        modeled_energy,
    })
}

fn day_factor(day: usize, date: NaiveDate, modeled: f64, total: f64) -> Result<f64, PipelineError> {
    if total == 0.0 {
        return Err(PipelineError::ZeroGroundTruth { day, date });
    }
    if !total.is_finite() || total < 0.0 {
        return Err(PipelineError::InvalidGroundTruth { day, date, value: total });
    }
    if !modeled.is_finite() || modeled <= 0.0 {
        return Err(PipelineError::ZeroModeledEnergy { day, date });
    }
    Ok(modeled / total)
}

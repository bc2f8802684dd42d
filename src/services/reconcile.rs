//! End-to-end reconciliation of one analysis window.
//!
//! raw model curve ─► normalize against daily totals ─► compare with sensor
//! ─► anomaly overlay + per-day summary + output records.

use tracing::info;

use crate::errors::PipelineError;
use crate::models::report::{AnomalyOverlay, DailySummary, OutputRecord};
use crate::models::series::HourlySeries;
use crate::services::anomaly::{AnomalyComparator, AnomalyModel};
use crate::services::normalizer::{hourly_energy_mj, normalize};

/// Everything one run produces. Nothing is emitted unless the whole window
/// reconciled successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub normalized: HourlySeries,
    pub measured: HourlySeries<Option<f64>>,
    pub overlay: AnomalyOverlay,
    pub daily: Vec<DailySummary>,
}

pub fn reconcile<M: AnomalyModel + ?Sized>(
    raw: &HourlySeries,
    daily_totals: &[f64],
    measured: &HourlySeries<Option<f64>>,
    model: &M,
    comparator: &AnomalyComparator,
) -> Result<Reconciliation, PipelineError> {
    raw.ensure_aligned(measured, "measured vs modeled series")?;

    let normalization = normalize(raw, daily_totals)?;
    let overlay = comparator.detect(model, &normalization.series, measured)?;

    let daily = measured
        .days()
        .enumerate()
        .map(|(day, (date, hours))| DailySummary {
            date,
            ground_truth_mj: daily_totals[day],
            modeled_mj: normalization.modeled_energy[day],
            sensor_mj: hours.iter().flatten().map(|p| hourly_energy_mj(*p)).sum(),
            missing_sensor_hours: hours.iter().filter(|h| h.is_none()).count(),
            factor: normalization.factors[day],
        })
        .collect();

    info!(
        days = raw.day_count(),
        anomalies = overlay.count(),
        threshold = comparator.threshold(),
        "window reconciled"
    );

    Ok(Reconciliation {
        normalized: normalization.series,
        measured: measured.clone(),
        overlay,
        daily,
    })
}

impl Reconciliation {
    pub fn records(&self) -> Vec<OutputRecord> {
        self.normalized
            .timestamps()
            .iter()
            .zip(self.normalized.values())
            .zip(self.measured.values())
            .map(|((t, modeled), measured)| OutputRecord::new(t, *measured, *modeled))
            .collect()
    }
}

//! Anomaly statistics contract and the threshold comparator.
//!
//! The statistic itself is pluggable: anything implementing [`AnomalyModel`]
//! can feed the comparator. [`WindowedMeanShift`] is the variant shipped with
//! the command-line tool.

use tracing::debug;

use crate::errors::PipelineError;
use crate::models::report::AnomalyOverlay;
use crate::models::series::{HourlySeries, TimePoint};

/// Cut-point on the mean-shift statistic. Strictly greater is anomalous.
pub const ANOMALY_THRESHOLD: f64 = 1.0;

/// Per-index statistics produced by an anomaly model.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyStats {
    /// Localized discrepancy magnitude, already scaled so 1.0 is the noise level
    pub mean_shift: Vec<f64>,
    /// Diagnostic feature the statistic was derived from
    pub feature: Vec<f64>,
}

pub trait AnomalyModel {
    /// Compares `comparison` against `reference`; `None` marks a missing sample.
    /// The returned arrays must be index-aligned with the inputs.
    fn compute(
        &self,
        timestamps: &[TimePoint],
        reference: &[f64],
        comparison: &[Option<f64>],
    ) -> Result<AnomalyStats, PipelineError>;
}

// ─── Windowed mean shift ─────────────────────────────────────

/// Mean residual over a centred window, in units of the residual spread.
///
/// residual = comparison − reference at present samples; the statistic at i
/// is |mean residual within ±window_hours/2| divided by the population
/// standard deviation of every present residual.
#[derive(Debug, Clone, Copy)]
pub struct WindowedMeanShift {
    pub window_hours: usize,
}

impl Default for WindowedMeanShift {
    fn default() -> Self {
        Self { window_hours: 6 }
    }
}

impl AnomalyModel for WindowedMeanShift {
    fn compute(
        &self,
        timestamps: &[TimePoint],
        reference: &[f64],
        comparison: &[Option<f64>],
    ) -> Result<AnomalyStats, PipelineError> {
        let n = timestamps.len();
        check_len("reference vs timestamps", n, reference.len())?;
        check_len("comparison vs timestamps", n, comparison.len())?;

        let residuals: Vec<Option<f64>> = reference
            .iter()
            .zip(comparison)
            .map(|(r, c)| c.map(|c| c - r))
            .collect();
        let feature = residuals.iter().map(|r| r.unwrap_or(0.0)).collect();

        let present: Vec<f64> = residuals.iter().flatten().copied().collect();
        if present.is_empty() {
            return Ok(AnomalyStats {
                mean_shift: vec![0.0; n],
                feature,
            });
        }
        let mean = present.iter().sum::<f64>() / present.len() as f64;
        let spread = (present.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / present.len() as f64).sqrt();
        if spread == 0.0 || !spread.is_finite() {
            return Ok(AnomalyStats {
                mean_shift: vec![0.0; n],
                feature,
            });
        }

        // Prefix sums of present residuals and their counts
        let mut sums = vec![0.0; n + 1];
        let mut counts = vec![0usize; n + 1];
        for (i, r) in residuals.iter().enumerate() {
            sums[i + 1] = sums[i] + r.unwrap_or(0.0);
            counts[i + 1] = counts[i] + usize::from(r.is_some());
        }

        let half = self.window_hours / 2;
        let mean_shift = (0..n)
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(n);
                let count = counts[hi] - counts[lo];
                if count == 0 {
                    0.0
                } else {
                    ((sums[hi] - sums[lo]) / count as f64).abs() / spread
                }
            })
            .collect();

        Ok(AnomalyStats { mean_shift, feature })
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), PipelineError> {
    if expected != actual {
        return Err(PipelineError::ShapeMismatch { what, expected, actual });
    }
    Ok(())
}

// ─── Comparator ──────────────────────────────────────────────

/// Classifies each hour independently against a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyComparator {
    threshold: f64,
}

impl Default for AnomalyComparator {
    fn default() -> Self {
        Self::new(ANOMALY_THRESHOLD)
    }
}

impl AnomalyComparator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Builds the overlay from a precomputed statistic. NaN statistics
    /// never exceed the threshold.
    pub fn classify(&self, normalized: &HourlySeries, mean_shift: &[f64]) -> Result<AnomalyOverlay, PipelineError> {
        check_len("mean-shift statistic vs series", normalized.len(), mean_shift.len())?;

        let points = normalized
            .values()
            .iter()
            .zip(mean_shift)
            .map(|(value, shift)| (*shift > self.threshold).then_some(*value))
            .collect();
        Ok(AnomalyOverlay::new(points))
    }

    /// Runs `model` on the two series and classifies the result.
    pub fn detect<M: AnomalyModel + ?Sized>(
        &self,
        model: &M,
        normalized: &HourlySeries,
        measured: &HourlySeries<Option<f64>>,
    ) -> Result<AnomalyOverlay, PipelineError> {
        normalized.ensure_aligned(measured, "measured vs normalized series")?;
        let stats = model.compute(normalized.timestamps(), normalized.values(), measured.values())?;
        check_len("feature vs series", normalized.len(), stats.feature.len())?;
        debug!(
            max_residual = stats.feature.iter().fold(0.0_f64, |m, f| m.max(f.abs())),
            "anomaly statistics computed"
        );
        self.classify(normalized, &stats.mean_shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::series::hourly_window;
    use chrono::NaiveDate;

    fn series(values: Vec<f64>) -> HourlySeries {
        let start = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let window = hourly_window(start, values.len() / 24, chrono_tz::Australia::Brisbane).unwrap();
        HourlySeries::new(window, values).unwrap()
    }

    /// Replays a fixed statistic regardless of input.
    struct Fixed(Vec<f64>);

    impl AnomalyModel for Fixed {
        fn compute(&self, _: &[TimePoint], _: &[f64], _: &[Option<f64>]) -> Result<AnomalyStats, PipelineError> {
            Ok(AnomalyStats {
                mean_shift: self.0.clone(),
                feature: vec![0.0; self.0.len()],
            })
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let normalized = series(vec![250.0; 24]);
        let mut shift = vec![0.0; 24];
        shift[3] = 1.0;
        shift[4] = 1.0 + f64::EPSILON;
        shift[5] = f64::NAN;

        let overlay = AnomalyComparator::default().classify(&normalized, &shift).unwrap();
        assert_eq!(overlay.get(3), None, "exactly 1.0 must not be anomalous");
        assert_eq!(overlay.get(4), Some(250.0));
        assert_eq!(overlay.get(5), None);
        assert_eq!(overlay.count(), 1);
    }

    #[test]
    fn test_anomalous_zero_is_carried() {
        let normalized = series(vec![0.0; 24]);
        let mut shift = vec![0.0; 24];
        shift[0] = 5.0;
        let overlay = AnomalyComparator::default().classify(&normalized, &shift).unwrap();
        assert_eq!(overlay.get(0), Some(0.0));
        assert_eq!(overlay.get(1), None);
        assert_eq!(overlay.anomalies().collect::<Vec<_>>(), vec![(0, 0.0)]);
    }

    #[test]
    fn test_statistic_length_mismatch_fails() {
        let normalized = series(vec![1.0; 24]);
        let err = AnomalyComparator::default().classify(&normalized, &[2.0; 23]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { expected: 24, actual: 23, .. }));

        let measured = normalized.with_values(vec![Some(1.0); 24]).unwrap();
        let err = AnomalyComparator::default()
            .detect(&Fixed(vec![2.0; 30]), &normalized, &measured)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { actual: 30, .. }));
    }

    #[test]
    fn test_detect_is_repeatable() {
        let normalized = series((0..48).map(|i| (i % 24) as f64 * 20.0).collect());
        let measured = normalized
            .with_values(normalized.values().iter().map(|v| Some(v * 1.3)).collect())
            .unwrap();
        let comparator = AnomalyComparator::default();
        let model = WindowedMeanShift::default();

        let first = comparator.detect(&model, &normalized, &measured).unwrap();
        let second = comparator.detect(&model, &normalized, &measured).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), normalized.len());
    }

    #[test]
    fn test_mean_shift_flags_offset_block() {
        let normalized = series(vec![100.0; 48]);
        let measured: Vec<Option<f64>> = (0..48)
            .map(|i| if (20..26).contains(&i) { Some(400.0) } else { Some(100.0) })
            .collect();
        let measured = normalized.with_values(measured).unwrap();

        let overlay = AnomalyComparator::default()
            .detect(&WindowedMeanShift::default(), &normalized, &measured)
            .unwrap();
        assert_eq!(overlay.get(23), Some(100.0));
        assert_eq!(overlay.get(10), None);
        assert_eq!(overlay.get(40), None);
    }

    #[test]
    fn test_mean_shift_ignores_missing_samples() {
        let normalized = series(vec![100.0; 24]);
        let mut measured = vec![Some(100.0); 24];
        measured[7] = None;
        measured[8] = None;

        let stats = WindowedMeanShift::default()
            .compute(normalized.timestamps(), normalized.values(), &measured)
            .unwrap();
        // Every present residual is zero, so there is no spread to scale by
        assert!(stats.mean_shift.iter().all(|s| *s == 0.0));
        assert_eq!(stats.feature[7], 0.0);
    }

    #[test]
    fn test_mean_shift_all_missing() {
        let normalized = series(vec![100.0; 24]);
        let stats = WindowedMeanShift::default()
            .compute(normalized.timestamps(), normalized.values(), &[None; 24])
            .unwrap();
        assert_eq!(stats.mean_shift, vec![0.0; 24]);
    }
}

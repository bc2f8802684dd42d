/// ============================================================
///  Clear-sky direct irradiance model
///
///  Algorithm pipeline:
///   1. Solar geometry  – declination, equation of time, true solar
///                        time, hour angle, elevation, azimuth
///   2. Clear-sky model – apparent extraterrestrial flux attenuated
///                        by a seasonal optical depth over the air mass
///   3. Hourly series   – one independent evaluation per grid instant
///
///  Every evaluation is a pure function of (instant, location), so the
///  window can be evaluated in any order or in parallel.
/// ============================================================

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::f64::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::errors::PipelineError;
use crate::models::series::{HourlySeries, TimePoint};

const DEG: f64 = PI / 180.0;

// ─── Public output ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Elevation above the horizon, degrees (negative at night)
    pub altitude_deg: f64,
    /// Degrees from North, clockwise
    pub azimuth_deg: f64,
}

/// Sun position for an instant at a geographic point.
///
/// * `lat_deg`  – geographic latitude  (−90 … +90)
/// * `lon_deg`  – geographic longitude (−180 … +180), east positive
pub fn solar_position<Tz: TimeZone>(t: &DateTime<Tz>, lat_deg: f64, lon_deg: f64) -> SolarPosition {
    let utc = t.with_timezone(&Utc);

    // ── 1. Time decomposition ──────────────────────────────────
    let doy = utc.ordinal() as f64;
    let ut_h = utc.hour() as f64 + utc.minute() as f64 / 60.0 + utc.second() as f64 / 3600.0;

    // ── 2. Solar geometry ──────────────────────────────────────
    // a) Declination (Spencer 1971)
    let b = 2.0 * PI * (doy - 1.0) / 365.0;
    let decl = 0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin() - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin();

    // b) Equation of Time (minutes, Spencer 1971)
    let eot_min = 229.18
        * (0.000075 + 0.001868 * b.cos() - 0.032077 * b.sin() - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin());

    // c) True solar time straight from UT, no civil-time detour
    let tst_h = ut_h + lon_deg / 15.0 + eot_min / 60.0;

    // d) Hour angle (negative in morning, positive afternoon)
    let omega = 15.0 * (tst_h - 12.0) * DEG;

    // e) Elevation
    let lat = lat_deg * DEG;
    let sin_alpha = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos()).clamp(-1.0, 1.0);
    let alpha = sin_alpha.asin();

    // f) Azimuth
    let cos_az = if alpha.cos().abs() > 1e-9 && lat.cos().abs() > 1e-9 {
        (decl.sin() - sin_alpha * lat.sin()) / (alpha.cos() * lat.cos())
    } else {
        0.0
    };
    let az_abs = cos_az.clamp(-1.0, 1.0).acos() / DEG;
    // Hour angle folded into (−180, 180]; afternoon mirrors the morning azimuth
    let omega_deg = (omega / DEG + 180.0).rem_euclid(360.0) - 180.0;
    let azimuth_deg = if omega_deg > 0.0 { 360.0 - az_abs } else { az_abs };

    SolarPosition {
        altitude_deg: alpha / DEG,
        azimuth_deg,
    }
}

// ─── Clear-sky models ────────────────────────────────────────

/// Direct (beam) irradiance under a cloudless sky.
///
/// Implementations must return W/m² that is never negative, exactly zero
/// for `altitude_deg <= 0`, and continuous in altitude.
pub trait ClearSkyModel: Send + Sync {
    fn direct_irradiance(&self, t: &TimePoint, altitude_deg: f64) -> f64;
}

/// ASHRAE clear-sky beam model: seasonal apparent extraterrestrial flux
/// attenuated by a seasonal optical depth over the relative air mass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AshraeClearSky;

impl AshraeClearSky {
    /// Apparent extraterrestrial flux A (W/m²) for a day of year
    fn apparent_flux(doy: f64) -> f64 {
        1160.0 + 75.0 * (2.0 * PI / 365.0 * (doy - 275.0)).sin()
    }

    /// Atmospheric optical depth k for a day of year
    fn optical_depth(doy: f64) -> f64 {
        0.174 + 0.035 * (2.0 * PI / 365.0 * (doy - 100.0)).sin()
    }
}

impl ClearSkyModel for AshraeClearSky {
    fn direct_irradiance(&self, t: &TimePoint, altitude_deg: f64) -> f64 {
        if altitude_deg <= 0.0 {
            return 0.0;
        }
        let doy = t.with_timezone(&Utc).ordinal() as f64;
        let air_mass = 1.0 / (altitude_deg * DEG).sin();
        // exp(-k·m) → 0 as altitude → 0⁺, keeping the curve continuous
        (Self::apparent_flux(doy) * (-Self::optical_depth(doy) * air_mass).exp()).max(0.0)
    }
}

// ─── Astronomical model ──────────────────────────────────────

/// Clear-sky irradiance at one site.
#[derive(Debug, Clone)]
pub struct AstronomicalModel<C = AshraeClearSky> {
    pub latitude: f64,
    pub longitude: f64,
    clear_sky: C,
}

impl AstronomicalModel<AshraeClearSky> {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::with_clear_sky(latitude, longitude, AshraeClearSky)
    }
}

impl<C: ClearSkyModel> AstronomicalModel<C> {
    pub fn with_clear_sky(latitude: f64, longitude: f64, clear_sky: C) -> Self {
        Self {
            latitude,
            longitude,
            clear_sky,
        }
    }

    pub fn position(&self, t: &TimePoint) -> SolarPosition {
        solar_position(t, self.latitude, self.longitude)
    }

    pub fn altitude(&self, t: &TimePoint) -> f64 {
        self.position(t).altitude_deg
    }

    pub fn direct_irradiance(&self, t: &TimePoint, altitude_deg: f64) -> f64 {
        self.clear_sky.direct_irradiance(t, altitude_deg)
    }

    /// Direct irradiance (W/m²) at an instant; zero while the sun is down.
    pub fn irradiance_at(&self, t: &TimePoint) -> f64 {
        let alt = self.altitude(t);
        if alt <= 0.0 {
            0.0
        } else {
            self.direct_irradiance(t, alt)
        }
    }

    /// Raw hourly series over the window, one evaluation per instant.
    pub fn series(&self, window: Vec<TimePoint>) -> Result<HourlySeries, PipelineError> {
        #[cfg(feature = "parallel")]
        let values: Vec<f64> = window.par_iter().map(|t| self.irradiance_at(t)).collect();
        #[cfg(not(feature = "parallel"))]
        let values: Vec<f64> = window.iter().map(|t| self.irradiance_at(t)).collect();

        HourlySeries::new(window, values)
    }
}

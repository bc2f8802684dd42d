mod config;
mod errors;
mod models;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info, warn, Level};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::report::UploadPayload;
use crate::models::series::hourly_window;
use crate::services::anomaly::{AnomalyComparator, WindowedMeanShift};
use crate::services::astronomy::AstronomicalModel;
use crate::services::ground_truth::{collect_daily_totals, PointExtractSource};
use crate::services::reconcile::reconcile;
use crate::services::sensor::{CsvSensorSource, SensorSource};
use crate::services::sink;

/// Compare a weather station's solar readings with clear-sky irradiance
/// scaled to independent daily totals, and flag the hours where they disagree.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Run configuration (JSON)
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Hourly CSV output, overrides output.csv_file
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Upload endpoint, overrides output.endpoint
    #[arg(long)]
    output_endpoint: Option<String>,

    /// Skip the HTTP upload even if an endpoint is configured
    #[arg(long)]
    no_upload: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose || cfg!(feature = "verbose_log") { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    // 1. Load configuration
    let config = Config::load(&args.config)?;
    let tz = config.timezone()?;
    let site = &config.site;
    info!(
        latitude = site.latitude,
        longitude = site.longitude,
        timezone = %tz,
        start = %config.window.start_date,
        days = config.window.days,
        "configuration loaded"
    );

    // 2. Clear-sky model over the hourly window
    let window = hourly_window(config.window.start_date, config.window.days, tz)?;
    let model = AstronomicalModel::new(site.latitude, site.longitude);
    let raw = model.series(window)?;
    info!(hours = raw.len(), "clear-sky series evaluated");
    if let Some((peak, _)) = raw.days().next().and_then(|(_, day)| {
        day.iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
    }) {
        let t = raw.timestamps()[peak];
        let pos = model.position(&t);
        debug!(
            time = %t,
            altitude = pos.altitude_deg,
            azimuth = pos.azimuth_deg,
            irradiance = raw.values()[peak],
            "first-day peak"
        );
    }

    // 3. Daily ground truth
    let totals = collect_daily_totals(
        &PointExtractSource,
        &config.ground_truth.directory,
        site.latitude,
        site.longitude,
        &raw.day_dates(),
    )?;
    info!(days = totals.len(), dir = %config.ground_truth.directory.display(), "daily totals collected");

    // 4. Station readings on the same grid
    let sensor = CsvSensorSource {
        path: config.sensor.csv_path.clone(),
        time_column: config.sensor.time_column.clone(),
        value_column: config.sensor.value_column.clone(),
        time_format: config.sensor.time_format.clone(),
        tz,
    };
    let measured = sensor.hourly(raw.timestamps())?;

    // 5. Normalize and compare
    let anomaly_model = WindowedMeanShift {
        window_hours: config.anomaly.window_hours,
    };
    let comparator = AnomalyComparator::new(config.anomaly.threshold);
    let result = reconcile(&raw, &totals, &measured, &anomaly_model, &comparator)?;

    for day in &result.daily {
        debug!(
            date = %day.date,
            ground_truth_mj = day.ground_truth_mj,
            modeled_mj = day.modeled_mj,
            sensor_mj = day.sensor_mj,
            missing_hours = day.missing_sensor_hours,
            factor = day.factor,
            "daily energy"
        );
    }
    for (i, value) in result.overlay.anomalies() {
        info!(timestamp = %raw.timestamps()[i], modeled = value, measured = ?result.measured.values()[i], "anomaly");
    }

    // 6. Outputs, only once the whole window reconciled
    let records = result.records();
    let csv_file = args.output_file.unwrap_or(config.output.csv_file.clone());
    sink::write_hourly_csv(&csv_file, &records, &result.overlay)?;
    if let Some(path) = &config.output.daily_csv_file {
        sink::write_daily_csv(path, &result.daily)?;
    }

    let payload = UploadPayload::new(&config.output.candidate, &config.output.version, records);
    if let Some(path) = &config.output.json_file {
        sink::write_json(path, &payload)?;
    }

    // 7. Upload
    match args.output_endpoint.or(config.output.endpoint.clone()) {
        Some(_) if args.no_upload => warn!("upload skipped (--no-upload)"),
        Some(endpoint) => {
            let reply = sink::upload(&endpoint, &payload).await?;
            info!(reply = %reply.trim(), "endpoint replied");
        }
        None => info!("no upload endpoint configured"),
    }

    Ok(())
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod fetcher;
pub mod models;

use crate::config::Config;
use crate::core::aggregator::Aggregator;
use crate::core::alerts::{log_alerts, volatility_alerts, VolatilityAlert};
use crate::core::store;
use crate::core::timeseries::{self, MergeOutcome};
use crate::fetcher::http::HttpClient;
use crate::models::Record;

/// Installs the fmt subscriber; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// What one pipeline run did to the persisted series.
#[derive(Debug)]
pub struct RunSummary {
    pub date: String,
    pub ts: String,
    pub outcome: MergeOutcome,
    pub total: usize,
    pub alerts: Vec<VolatilityAlert>,
}

/// One capture: fetch everything, merge into the series file, write it back.
pub async fn run(config: &Config) -> Result<RunSummary> {
    let http = HttpClient::new(config);
    let aggregator = Aggregator::new(config, &http);
    run_with(config, &aggregator, Utc::now()).await
}

/// [`run`] with the sources and capture instant supplied by the caller.
pub async fn run_with(
    config: &Config,
    aggregator: &Aggregator,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    // history is read before any network work so a broken file fails fast
    let rows = store::read_rows(&config.data_path)?;

    let (date, ts) = clock::capture_stamp(now);
    info!("Capturing {} ({} records on file)", ts, rows.len());

    let snapshot = aggregator.snapshot().await;
    let record = Record::from_snapshot(date.clone(), ts.clone(), snapshot);
    if record.errors.is_partial_failure() {
        warn!(
            "Partial failure: {} major errors, {} detailed",
            record.errors.major().len(),
            record.errors.detailed_count()
        );
    }

    let (rows, outcome) = timeseries::merge(
        rows,
        record,
        config.rerun_window_minutes,
        config.retention,
    );

    let alerts = volatility_alerts(&rows, config.alert_pct);
    log_alerts(&alerts);

    store::write_rows(&config.data_path, &rows)?;
    info!(
        "Updated {} ({} {}, {:?}, {} records)",
        config.data_path.display(),
        date,
        ts,
        outcome,
        rows.len()
    );

    Ok(RunSummary {
        date,
        ts,
        outcome,
        total: rows.len(),
        alerts,
    })
}

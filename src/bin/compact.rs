use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};
use trade_data_lib::config::Config;
use trade_data_lib::core::{store, timeseries};

/// Offline repair: one record per morning/afternoon slot.
/// Usage: `compact [path]` (defaults to `TRADE_DATA_PATH`).
fn compact_file() -> Result<()> {
    let path = match std::env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => Config::from_env()?.data_path,
    };

    let rows = store::read_rows(&path)?;
    let cleaned = timeseries::compact(rows);

    store::write_rows(&path, &cleaned)?;
    info!("Cleaned and wrote {}", path.display());
    Ok(())
}

fn main() {
    trade_data_lib::init_tracing();

    if let Err(e) = compact_file() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

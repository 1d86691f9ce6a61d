use std::collections::BTreeMap;
use std::path::PathBuf;
use trade_data_lib::config::Config;
use trade_data_lib::core::alerts::volatility_alerts;
use trade_data_lib::core::{store, timeseries};

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| format!("{}", v)).unwrap_or_else(|| "—".to_string())
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_path.clone());

    println!("Reading: {}", path.display());
    if !path.exists() {
        println!("❌ File not found");
        return Ok(());
    }

    let mut rows = store::read_rows(&path)?;
    timeseries::sort_rows(&mut rows);
    println!("Records: {}", rows.len());

    let (Some(first), Some(latest)) = (rows.first(), rows.last()) else {
        return Ok(());
    };
    println!("Range:   {} .. {}", first.sort_key(), latest.sort_key());

    println!("\nLatest FX ({}):", latest.sort_key());
    for (name, value) in latest.fx.named() {
        println!("  {:<12} {}", name, fmt_value(value));
    }
    println!("  spot: {} | mid: {}", latest.fx.sources.spot, latest.fx.sources.mid);

    println!("\n{:<20} | {:>12} | {:<8} | Source", "Commodity", "Value", "Unit");
    println!("{}", "-".repeat(80));
    for (key, obs) in &latest.commodities {
        println!("{:<20} | {:>12} | {:<8} | {}", key, fmt_value(obs.value), obs.unit, obs.source);
    }

    let major = latest.errors.major();
    if latest.errors.is_partial_failure() {
        println!(
            "\n⚠️ Partial failure: {} detailed errors",
            latest.errors.detailed_count()
        );
        for e in &major {
            println!("  - {}", e);
        }
        if let Some(detailed) = &latest.errors.commodities_detailed {
            for (key, msg) in detailed {
                println!("  {}: {}", key, msg);
            }
        }
    } else {
        println!("\n✅ No errors in latest record");
    }

    let mut per_slot: BTreeMap<String, usize> = BTreeMap::new();
    for row in &rows {
        if !row.sort_key().is_empty() {
            *per_slot.entry(timeseries::slot_key(row.sort_key())).or_default() += 1;
        }
    }
    let crowded: Vec<_> = per_slot.iter().filter(|(_, n)| **n > 1).collect();
    if crowded.is_empty() {
        println!("\nSlots: {} (one record each)", per_slot.len());
    } else {
        println!("\nSlots: {} ({} with duplicates, run `compact`)", per_slot.len(), crowded.len());
        for (slot, n) in crowded {
            println!("  {} x{}", slot, n);
        }
    }

    let alerts = volatility_alerts(&rows, config.alert_pct);
    println!("\nVolatility alerts (>= {}%): {}", config.alert_pct, alerts.len());
    for a in alerts {
        println!(
            "  {:<20} {:+.1}%  ({} -> {})",
            a.key, a.pct, a.previous, a.current
        );
    }

    Ok(())
}

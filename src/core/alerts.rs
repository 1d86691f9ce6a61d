use tracing::warn;

use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Fx,
    Commodity,
}

/// Latest value moved at least the threshold against the previous valid one.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityAlert {
    pub kind: AlertKind,
    pub key: String,
    pub current: f64,
    pub previous: f64,
    pub pct: f64,
}

/// Percent change; `None` when either side is missing or `prev` is zero.
pub fn pct_change(curr: Option<f64>, prev: Option<f64>) -> Option<f64> {
    let c = curr.filter(|v| v.is_finite())?;
    let p = prev.filter(|v| v.is_finite() && *v != 0.0)?;
    Some((c - p) / p * 100.0)
}

/// Nearest value before the last record, scanning backwards.
pub fn find_prev<F>(rows: &[Record], pick: F) -> Option<f64>
where
    F: Fn(&Record) -> Option<f64>,
{
    let before_last = rows.len().checked_sub(1)?;
    rows[..before_last]
        .iter()
        .rev()
        .find_map(|r| pick(r).filter(|v| v.is_finite()))
}

/// Alerts for the last record of a sorted series, largest move first.
pub fn volatility_alerts(rows: &[Record], threshold_pct: f64) -> Vec<VolatilityAlert> {
    let Some(latest) = rows.last() else {
        return Vec::new();
    };
    let mut out = Vec::new();

    let fx_fields: [(&str, fn(&Record) -> Option<f64>); 4] = [
        ("usdCnyMid", |r| r.fx.usd_cny_mid),
        ("usdCny", |r| r.fx.usd_cny),
        ("usdBrl", |r| r.fx.usd_brl),
        ("brlCny", |r| r.fx.brl_cny),
    ];
    for (key, pick) in fx_fields {
        let current = pick(latest);
        let previous = find_prev(rows, pick);
        push_if_volatile(&mut out, AlertKind::Fx, key, current, previous, threshold_pct);
    }

    for key in latest.commodities.keys() {
        let current = latest.commodity_value(key);
        let previous = find_prev(rows, |r| r.commodity_value(key));
        push_if_volatile(&mut out, AlertKind::Commodity, key, current, previous, threshold_pct);
    }

    out.sort_by(|a, b| b.pct.abs().total_cmp(&a.pct.abs()));
    out
}

fn push_if_volatile(
    out: &mut Vec<VolatilityAlert>,
    kind: AlertKind,
    key: &str,
    current: Option<f64>,
    previous: Option<f64>,
    threshold_pct: f64,
) {
    if let (Some(pct), Some(c), Some(p)) = (pct_change(current, previous), current, previous) {
        if pct.abs() >= threshold_pct {
            out.push(VolatilityAlert {
                kind,
                key: key.to_string(),
                current: c,
                previous: p,
                pct,
            });
        }
    }
}

pub fn log_alerts(alerts: &[VolatilityAlert]) {
    for a in alerts {
        warn!(
            "Volatility alert: {} moved {:+.1}% ({} -> {})",
            a.key, a.pct, a.previous, a.current
        );
    }
}

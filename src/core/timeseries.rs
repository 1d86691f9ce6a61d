use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::clock::parse_ts;
use crate::models::Record;

pub const MORNING_SLOT: &str = "09:30";
pub const AFTERNOON_SLOT: &str = "16:00";
/// First hour that belongs to the afternoon checkpoint.
pub const AFTERNOON_FROM_HOUR: u32 = 13;

pub fn slot_label(hour: u32) -> &'static str {
    if hour < AFTERNOON_FROM_HOUR {
        MORNING_SLOT
    } else {
        AFTERNOON_SLOT
    }
}

/// Hour-of-day as written in the timestamp string (characters 11..13).
/// Date-only and malformed stamps count as hour 0.
fn hour_of(ts: &str) -> u32 {
    ts.get(11..13)
        .and_then(|h| h.parse::<u32>().ok())
        .unwrap_or(0)
}

/// `YYYY-MM-DD|09:30` or `YYYY-MM-DD|16:00`.
pub fn slot_key(ts: &str) -> String {
    let date = ts.get(..10).unwrap_or(ts);
    format!("{}|{}", date, slot_label(hour_of(ts)))
}

/// `YYYY-MM-DDT<slot>:00+08:00` for a key produced by [`slot_key`].
pub fn canonical_slot_ts(key: &str) -> String {
    let (date, slot) = key.split_once('|').unwrap_or((key, MORNING_SLOT));
    format!("{}T{}:00+08:00", date, slot)
}

/// Milliseconds since the epoch for an ISO timestamp or a bare date.
fn epoch_millis(s: &str) -> Option<i64> {
    if let Some(dt) = parse_ts(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Appended,
    /// The previous last record was a rerun of the same capture and was replaced.
    Replaced,
}

/// Stable ascending sort by `ts` (or `date` when `ts` is absent).
pub fn sort_rows(rows: &mut [Record]) {
    rows.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
}

/// Merges one new record into the persisted sequence.
///
/// If the last persisted record is less than `window_minutes` older than
/// `incoming`, it is replaced; otherwise `incoming` is appended. The result is
/// cut to the newest `cap` records and sorted.
pub fn merge(
    mut rows: Vec<Record>,
    incoming: Record,
    window_minutes: i64,
    cap: usize,
) -> (Vec<Record>, MergeOutcome) {
    let delta_minutes = rows.last().and_then(|last| {
        let last_ms = epoch_millis(&last.ts)?;
        let new_ms = epoch_millis(&incoming.ts)?;
        Some((new_ms - last_ms) as f64 / 60_000.0)
    });

    let outcome = match delta_minutes {
        Some(delta) if delta < window_minutes as f64 => {
            debug!("Last record is {:.1} min old, replacing it", delta);
            rows.pop();
            MergeOutcome::Replaced
        }
        _ => MergeOutcome::Appended,
    };
    rows.push(incoming);

    if rows.len() > cap {
        let evicted = rows.len() - cap;
        rows.drain(..evicted);
        info!("Retention cap {} reached, evicted {} oldest records", cap, evicted);
    }

    sort_rows(&mut rows);
    (rows, outcome)
}

/// Collapses a historical sequence to one record per slot.
///
/// Within a slot the record with the latest `runTs` (else `ts`) wins; on equal
/// timestamps the later one in input order wins. Kept records get their `ts`
/// rewritten to the canonical slot instant. Records without `ts` or `date` are
/// dropped.
pub fn compact(rows: Vec<Record>) -> Vec<Record> {
    let before = rows.len();
    let mut best: BTreeMap<String, Record> = BTreeMap::new();

    for row in rows {
        let stamp = row.sort_key();
        if stamp.is_empty() {
            continue;
        }
        let key = slot_key(stamp);

        let replace = match best.get(&key) {
            None => true,
            Some(current) => match epoch_millis(recorded_at(&row)) {
                None => false,
                Some(new_ms) => match epoch_millis(recorded_at(current)) {
                    None => true,
                    Some(cur_ms) => new_ms >= cur_ms,
                },
            },
        };
        if replace {
            best.insert(key, row);
        }
    }

    let mut out: Vec<Record> = best
        .into_iter()
        .map(|(key, mut row)| {
            row.ts = canonical_slot_ts(&key);
            row
        })
        .collect();
    sort_rows(&mut out);

    info!("Compaction: {} records -> {}", before, out.len());
    out
}

fn recorded_at(row: &Record) -> &str {
    row.run_ts.as_deref().unwrap_or(&row.ts)
}

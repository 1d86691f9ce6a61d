use chrono::{DateTime, FixedOffset, Offset, Utc};

const BEIJING_OFFSET_SECS: i32 = 8 * 60 * 60;

pub fn beijing_offset() -> FixedOffset {
    FixedOffset::east_opt(BEIJING_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn to_beijing(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    instant.with_timezone(&beijing_offset())
}

/// `YYYY-MM-DD` calendar day on the UTC+8 civil clock.
pub fn day_string(instant: DateTime<Utc>) -> String {
    to_beijing(instant).format("%Y-%m-%d").to_string()
}

/// Capture instant as ISO-8601 with millisecond precision and a fixed `+08:00` suffix.
///
/// The offset is always rendered the same way so that lexicographic and
/// chronological ordering of persisted timestamps coincide.
pub fn ts_string(instant: DateTime<Utc>) -> String {
    to_beijing(instant)
        .format("%Y-%m-%dT%H:%M:%S%.3f+08:00")
        .to_string()
}

/// `(date, ts)` pair for a capture happening at `instant`.
pub fn capture_stamp(instant: DateTime<Utc>) -> (String, String) {
    (day_string(instant), ts_string(instant))
}

pub fn parse_ts(ts: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts).ok()
}

//! Canonical UTC timestamps: the fixed-width `YYYY-MM-DD HH:MM:SS` form,
//! whose text ordering matches time ordering.

use chrono::{DateTime, NaiveDateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn format_ts(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn now_ts() -> String {
    format_ts(now())
}

pub fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)?;
    Ok(naive.and_utc())
}

/// `base + seconds`, saturating at the representable range instead of
/// panicking on absurd operator-supplied delays.
pub fn plus_seconds(base: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    chrono::Duration::try_seconds(seconds)
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(if seconds >= 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}

//! UTC date helpers: day keys and 10-minute intraday buckets.

use chrono::{DateTime, NaiveDate, Timelike, Utc};

use crate::error::{Error, Result};

/// Width of an intraday bucket, in minutes.
pub const BUCKET_MINUTES: u32 = 10;

/// Today's UTC date.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a `YYYY-MM-DD` day string.
pub fn parse_day(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Input(format!("invalid date '{}': {}", input, e)))
}

/// Floor a timestamp to its 10-minute UTC boundary.
pub fn floor_to_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    let minute = ts.minute() - ts.minute() % BUCKET_MINUTES;
    ts.with_minute(minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// `HHMM` label of a bucket, as used in intraday keys.
pub fn bucket_label(bucket: DateTime<Utc>) -> String {
    bucket.format("%H%M").to_string()
}

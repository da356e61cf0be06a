//! Object key layout.
//!
//! - `daily/{date}/runs/{index:03}.json`: one archived run
//! - `daily/{date}.json`: canonical daily snapshot
//! - `intraday/{date}/{HHMM}.json`: one intraday sample

use chrono::NaiveDate;

pub const DAILY_PREFIX: &str = "daily/";
pub const INTRADAY_PREFIX: &str = "intraday/";

/// Prefix under which every run of `date` is stored.
pub fn runs_prefix(date: NaiveDate) -> String {
    format!("{}{}/runs/", DAILY_PREFIX, date)
}

pub fn run_key(date: NaiveDate, index: usize) -> String {
    format!("{}{:03}.json", runs_prefix(date), index)
}

/// Parse the ordinal out of a run key. Returns None for anything else.
pub fn run_index(key: &str) -> Option<usize> {
    let (_, file) = key.rsplit_once("/runs/")?;
    let stem = file.strip_suffix(".json")?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

pub fn snapshot_key(date: NaiveDate) -> String {
    format!("{}{}.json", DAILY_PREFIX, date)
}

/// Date of a top-level snapshot key (`daily/{date}.json`), skipping run keys.
pub fn snapshot_date(key: &str) -> Option<NaiveDate> {
    let rest = key.strip_prefix(DAILY_PREFIX)?;
    if rest.contains('/') {
        return None;
    }
    let day = rest.strip_suffix(".json")?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn intraday_prefix(date: NaiveDate) -> String {
    format!("{}{}/", INTRADAY_PREFIX, date)
}

pub fn intraday_key(date: NaiveDate, hhmm: &str) -> String {
    format!("{}{}.json", intraday_prefix(date), hhmm)
}

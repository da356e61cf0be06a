//! Data model: runs, daily snapshots, intraday samples.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A source cited by an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One immutable estimation sample.
///
/// Runs are identified by `(date, index)` in the archive; the index is not
/// part of the serialized body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Probability in `[0, 1]`.
    pub probability: f64,
    /// Markdown narrative backing the estimate.
    pub report: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub computed_at: DateTime<Utc>,
}

/// The consensus for one UTC date, derived entirely from its archived runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    pub date: NaiveDate,
    /// Estimator model that produced the runs, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub run_count: usize,
    pub average: f64,
    pub median: f64,
    pub stddev: f64,
    /// Probabilities, index-aligned with the archived runs.
    pub estimates: Vec<f64>,
    pub representative_report: String,
    #[serde(default)]
    pub representative_citations: Vec<Citation>,
    pub computed_at: DateTime<Utc>,
    /// Run keys the archive listed when this snapshot was built, readable or
    /// not. Staleness is judged against this rather than `run_count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<Run>>,
}

impl DailySnapshot {
    /// Outward-facing copy: no embedded runs, model tag, or archive bookkeeping.
    pub fn summary(&self) -> Self {
        Self {
            model: None,
            archived_count: None,
            runs: None,
            ..self.clone()
        }
    }
}

/// One time-bucketed observation in the intraday series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntradaySample {
    pub date: NaiveDate,
    /// Timestamp floored to a 10-minute UTC boundary.
    pub at: DateTime<Utc>,
    /// Run probability, or the daily average when sampled from a snapshot.
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl IntradaySample {
    /// Whether this is the explicit "no data" marker recorded for a failed tick.
    pub fn is_blank(&self) -> bool {
        self.probability == 0.0
            && self.report.as_deref().map_or(true, str::is_empty)
            && self.citations.as_ref().map_or(true, Vec::is_empty)
    }
}
